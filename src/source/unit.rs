use super::reader::WorkItem;

/// A non-empty group of items sent to the generation service in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    index: usize,
    items: Vec<WorkItem>,
}

impl WorkUnit {
    /// Returns `None` for an empty item list.
    pub fn new(index: usize, items: Vec<WorkItem>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self { index, items })
        }
    }

    /// Position of this unit in partition order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn first(&self) -> &WorkItem {
        &self.items[0]
    }

    pub fn words(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.word.as_str()).collect()
    }
}

/// Split items into consecutive units of `unit_size`; the last one may be shorter.
pub fn partition(items: &[WorkItem], unit_size: usize) -> Vec<WorkUnit> {
    items
        .chunks(unit_size.max(1))
        .enumerate()
        .filter_map(|(index, chunk)| WorkUnit::new(index, chunk.to_vec()))
        .collect()
}
