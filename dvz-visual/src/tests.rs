use super::*;
use dvz_request::{Batch, IdAllocator};

fn new_builder(batch: &mut Batch) -> Builder {
    Builder::new(batch, IdAllocator::new())
}

#[test]
fn alloc_sizes_attribute_buffers() {
    let mut v = Visual::new(0, VisualFlags::empty(), 1, 8);
    let a = v.add_attribute(Attribute::new(0, 0, 0, 8));
    v.alloc(4);
    let mut batch = Batch::new();
    let mut b = new_builder(&mut batch);
    v.data(a, 0, &[0u8; 8], &mut b).unwrap();
    assert_eq!(batch.len(), 1);
}

#[test]
fn data_without_alloc_errors() {
    let mut v = Visual::new(0, VisualFlags::empty(), 1, 8);
    let a = v.add_attribute(Attribute::new(0, 0, 0, 8));
    let mut batch = Batch::new();
    let mut b = new_builder(&mut batch);
    assert!(v.data(a, 0, &[0u8; 8], &mut b).is_err());
}

#[test]
fn data_quads_expands_one_rect_into_four_corners() {
    let mut v = Visual::new(0, VisualFlags::empty(), 1, 8);
    let a = v.add_attribute(Attribute::new(0, 0, 0, 8).repeating());
    v.alloc(4);
    let mut batch = Batch::new();
    let mut b = new_builder(&mut batch);
    v.data_quads(a, 0, &[(0.0, 0.0, 1.0, 1.0)], &mut b).unwrap();
    // one upload_dat request with 4 corners * 2 floats * 4 bytes = 32 bytes
    match &batch.requests()[0].content {
        dvz_request::Payload::UploadDat { data, .. } => assert_eq!(data.len(), 32),
        _ => panic!("expected UploadDat"),
    }
}

#[test]
fn mixing_repeat_and_non_repeat_writes_without_realloc_errors() {
    let mut v = Visual::new(0, VisualFlags::empty(), 1, 8);
    let a = v.add_attribute(Attribute::new(0, 0, 0, 8));
    v.alloc(8);
    let mut batch = Batch::new();
    let mut b = new_builder(&mut batch);
    v.data(a, 0, &[0u8; 8], &mut b).unwrap();
    let err = v.data_quads(a, 1, &[(0.0, 0.0, 1.0, 1.0)], &mut b);
    assert!(err.is_err());
}

#[test]
fn params_block_uploads_only_when_dirty() {
    let mut p = ParamsBlock::new(42, 16);
    let mut batch = Batch::new();
    let mut b = new_builder(&mut batch);
    assert!(!p.flush(&mut b));
    p.set_field(0, &1.0f32.to_le_bytes());
    assert!(p.flush(&mut b));
    assert!(!p.flush(&mut b), "second flush with no new writes is a no-op");
}

#[test]
fn draw_callback_overrides_default_mapping() {
    let mut v = Visual::new(0, VisualFlags::empty(), 1, 8);
    assert_eq!(v.draw_range(0, 3), (0, 3));
    v.set_draw_callback(Box::new(|first, count| (first * 6, count * 6)));
    assert_eq!(v.draw_range(0, 3), (0, 18));
}
