// Encoder sample bookkeeping for POST mux (§4.J.3): `(byte_offset_in_raw_
// stream, size, duration_in_90kHz_ticks)` triples, recorded as `on_sample`
// fires and replayed by `mux_post` after `stop`.
//
// Austin Shafer - 2020

#[derive(Debug, Clone, Copy)]
pub struct SampleEntry {
    pub raw_offset: u64,
    pub size: u64,
    pub duration: u64,
    pub keyframe: bool,
}

/// A geometric-growth vector of recorded samples, matching the C
/// original's `ARRAY_APPEND` resizing strategy via `Vec::push`'s own
/// amortized-doubling growth.
#[derive(Debug, Default, Clone)]
pub struct SampleList {
    entries: Vec<SampleEntry>,
}

impl SampleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: SampleEntry) {
        self.entries.push(entry);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SampleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
