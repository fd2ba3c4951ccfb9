use super::*;

#[test]
fn list_preserves_insertion_order() {
    let mut l: IdList<i32> = IdList::new();
    l.push(1);
    l.push(2);
    l.push(3);
    assert_eq!(l.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn list_remove_shifts_down() {
    let mut l: IdList<&str> = IdList::new();
    l.push("a");
    l.push("b");
    l.push("c");
    assert_eq!(l.remove(1), "b");
    assert_eq!(l.iter().copied().collect::<Vec<_>>(), vec!["a", "c"]);
}

#[test]
fn map_insert_get_remove() {
    let mut m: IdMap<String> = IdMap::new();
    m.insert(42, "hello".to_string());
    assert_eq!(m.get(42).unwrap(), "hello");
    assert!(m.contains(42));
    assert_eq!(m.remove(42).unwrap(), "hello");
    assert!(!m.contains(42));
}

#[test]
fn map_large_sparse_keys() {
    let mut m: IdMap<i32> = IdMap::new();
    m.insert(u64::MAX, 1);
    m.insert(0, 2);
    assert_eq!(m.len(), 2);
}
