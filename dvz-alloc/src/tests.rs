use super::*;

#[test]
fn system_alloc_round_trips() {
    use_system();
    let ptr = malloc(64).unwrap();
    unsafe { free(ptr, 64) };
}

#[test]
fn aligned_alloc_rounds_up_to_pointer_size() {
    let ptr = aligned_alloc(1, 3).unwrap();
    let min_align = std::mem::size_of::<*const ()>();
    assert_eq!(ptr as usize % min_align, 0);
    unsafe { aligned_free(ptr, 1, 3) };
}

#[test]
fn normalize_rounds_size_to_alignment() {
    let (align, size) = normalize_aligned_request(8, 10);
    assert_eq!(align, 8);
    assert_eq!(size, 16);
}

#[test]
fn set_none_reverts_to_default() {
    use_system();
    set(None);
    assert_eq!(active_name(), "system");
}
