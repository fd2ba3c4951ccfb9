use super::*;
use dvz_request::{Action, Batch, IdAllocator, ObjectType, RecordCommand};

fn record_commands(batch: &Batch) -> Vec<RecordCommand> {
    batch
        .requests()
        .iter()
        .filter(|r| r.action == Action::Record && r.object_type == ObjectType::Record)
        .map(|r| match &r.content {
            dvz_request::Payload::Record(cmd) => cmd.clone(),
            _ => unreachable!(),
        })
        .collect()
}

#[test]
fn scenario_2_viewset_rebuild_order() {
    // Two views: V1 offset(0,0) shape(400,300) with one instance (visual A,
    // 6 verts); V2 offset(400,0) shape(400,300) with two instances (visual
    // B, 3 verts; visual C, 3 verts, hidden). Expected emission order:
    // begin; viewport V1; draw A(0,6,0,1); viewport V2; draw B(0,3,0,1); end.
    let mut viewset = Viewset::new(1);

    let mut v1 = View::new(Point2::new(0, 0), Point2::new(400, 300));
    v1.add_instance(Instance::new(10, 100, DrawMode::Direct).with_range(DrawRange {
        vertex_count: 6,
        instance_count: 1,
        ..Default::default()
    }));
    viewset.add_view(v1);

    let mut v2 = View::new(Point2::new(400, 0), Point2::new(400, 300));
    v2.add_instance(Instance::new(20, 200, DrawMode::Direct).with_range(DrawRange {
        vertex_count: 3,
        instance_count: 1,
        ..Default::default()
    }));
    v2.add_instance(
        Instance::new(30, 300, DrawMode::Direct)
            .with_range(DrawRange {
                vertex_count: 3,
                instance_count: 1,
                ..Default::default()
            })
            .hidden(),
    );
    viewset.add_view(v2);

    let mut batch = Batch::new();
    let mut builder = Builder::new(&mut batch, IdAllocator::new());
    viewset.build(&mut builder);

    let cmds = record_commands(&batch);
    assert!(matches!(cmds[0], RecordCommand::Begin));
    assert!(matches!(cmds[1], RecordCommand::Viewport { offset: (0, 0), shape: (400, 300) }));
    match &cmds[2] {
        RecordCommand::Draw {
            graphics,
            vertex_count,
            instance_count,
            ..
        } => {
            assert_eq!(*graphics, 100);
            assert_eq!(*vertex_count, 6);
            assert_eq!(*instance_count, 1);
        }
        _ => panic!("expected Draw"),
    }
    assert!(matches!(
        cmds[3],
        RecordCommand::Viewport {
            offset: (400, 0),
            shape: (400, 300)
        }
    ));
    match &cmds[4] {
        RecordCommand::Draw { graphics, vertex_count, .. } => {
            assert_eq!(*graphics, 200);
            assert_eq!(*vertex_count, 3);
        }
        _ => panic!("expected Draw for visible instance only"),
    }
    assert!(matches!(cmds[5], RecordCommand::End));
    assert_eq!(cmds.len(), 6, "hidden instance C must not emit a draw");
}

#[test]
fn build_is_idempotent() {
    let mut viewset = Viewset::new(1);
    let mut v1 = View::new(Point2::new(0, 0), Point2::new(100, 100));
    v1.add_instance(Instance::new(1, 1, DrawMode::Direct));
    viewset.add_view(v1);

    let mut batch1 = Batch::new();
    let mut b1 = Builder::new(&mut batch1, IdAllocator::new());
    viewset.build(&mut b1);

    let mut batch2 = Batch::new();
    let mut b2 = Builder::new(&mut batch2, IdAllocator::new());
    viewset.build(&mut b2);

    assert_eq!(record_commands(&batch1).len(), record_commands(&batch2).len());
}

#[test]
fn scenario_3_view_mouse_mapping() {
    let view = View::new(Point2::new(10, 20), Point2::new(100, 200));

    let s = view.global_to_scaled((10.0, 20.0));
    assert!((s.0 - -1.0).abs() < 1e-9 && (s.1 - 1.0).abs() < 1e-9);

    let s = view.global_to_scaled((60.0, 120.0));
    assert!(s.0.abs() < 1e-9 && s.1.abs() < 1e-9);

    let s = view.global_to_scaled((110.0, 220.0));
    assert!((s.0 - 1.0).abs() < 1e-9 && (s.1 - -1.0).abs() < 1e-9);

    let s = view.global_to_scaled((210.0, 20.0));
    assert!((s.0 - 3.0).abs() < 1e-9 && (s.1 - 1.0).abs() < 1e-9);
}

#[test]
fn indexed_and_indirect_draws_dispatch_correctly() {
    let mut viewset = Viewset::new(1);
    let mut v = View::new(Point2::new(0, 0), Point2::new(10, 10));
    v.add_instance(Instance::new(1, 1, DrawMode::Indexed).with_range(DrawRange {
        first_index: 3,
        index_count: 6,
        instance_count: 1,
        ..Default::default()
    }));
    v.add_instance(Instance::new(2, 2, DrawMode::Indirect).with_range(DrawRange {
        indirect_dat: 99,
        indirect_count: 1,
        ..Default::default()
    }));
    viewset.add_view(v);

    let mut batch = Batch::new();
    let mut b = Builder::new(&mut batch, IdAllocator::new());
    viewset.build(&mut b);
    let cmds = record_commands(&batch);
    assert!(matches!(cmds[1], RecordCommand::DrawIndexed { index_count: 6, .. }));
    assert!(matches!(cmds[2], RecordCommand::DrawIndirect { indirect_dat: 99, .. }));
}
