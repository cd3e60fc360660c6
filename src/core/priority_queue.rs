/// Binary min-heap whose ordering is supplied by the caller on every
/// mutating call.
///
/// Several cursors (phrase positions, span cells, merge infos) live in an
/// arena and are ordered by state the heap cannot see, so the comparison is
/// passed in rather than fixed through `Ord`. `less(a, b)` must return true
/// when `a` belongs closer to the top. Ties keep the sift order of a classic
/// array heap, which callers rely on for deterministic ordering.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    heap: Vec<T>,
    max_size: usize,
}

impl<T> PriorityQueue<T> {
    pub fn new(max_size: usize) -> Self {
        PriorityQueue {
            heap: Vec::with_capacity(max_size.min(4096)),
            max_size,
        }
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn top(&self) -> Option<&T> {
        self.heap.first()
    }

    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.heap.first_mut()
    }

    /// Adds an element regardless of `max_size`.
    pub fn put<F>(&mut self, element: T, mut less: F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        self.heap.push(element);
        self.up_heap(&mut less);
    }

    /// Adds an element if the queue has room or the element beats the top.
    /// Returns the element that did not make it, if any.
    pub fn insert<F>(&mut self, element: T, mut less: F) -> Option<T>
    where
        F: FnMut(&T, &T) -> bool,
    {
        if self.heap.len() < self.max_size {
            self.put(element, less);
            None
        } else if !self.heap.is_empty() && !less(&element, &self.heap[0]) {
            let displaced = std::mem::replace(&mut self.heap[0], element);
            self.down_heap(&mut less);
            Some(displaced)
        } else {
            Some(element)
        }
    }

    pub fn pop<F>(&mut self, mut less: F) -> Option<T>
    where
        F: FnMut(&T, &T) -> bool,
    {
        if self.heap.is_empty() {
            return None;
        }
        let result = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.down_heap(&mut less);
        }
        Some(result)
    }

    /// Restores heap order after the top element changed in place.
    pub fn adjust_top<F>(&mut self, mut less: F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        if !self.heap.is_empty() {
            self.down_heap(&mut less);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.heap
    }

    fn up_heap<F>(&mut self, less: &mut F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        let mut i = self.heap.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if !less(&self.heap[i], &self.heap[parent]) {
                break;
            }
            self.heap.swap(i, parent);
            i = parent;
        }
    }

    fn down_heap<F>(&mut self, less: &mut F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        let size = self.heap.len();
        let mut i = 0;
        loop {
            let mut child = 2 * i + 1;
            if child >= size {
                break;
            }
            let right = child + 1;
            if right < size && less(&self.heap[right], &self.heap[child]) {
                child = right;
            }
            if !less(&self.heap[child], &self.heap[i]) {
                break;
            }
            self.heap.swap(i, child);
            i = child;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn less(a: &i32, b: &i32) -> bool {
        a < b
    }

    #[test]
    fn pops_in_ascending_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pq = PriorityQueue::new(1000);
        let mut expected = Vec::new();
        for _ in 0..500 {
            let v: i32 = rng.gen_range(-1000..1000);
            expected.push(v);
            pq.put(v, less);
        }
        expected.sort();
        let mut actual = Vec::new();
        while let Some(v) = pq.pop(less) {
            actual.push(v);
        }
        assert_eq!(actual, expected);
    }

    #[test]
    fn insert_keeps_the_largest() {
        let mut pq = PriorityQueue::new(3);
        for v in [5, 1, 9, 3, 7, 2] {
            pq.insert(v, less);
        }
        let mut kept = Vec::new();
        while let Some(v) = pq.pop(less) {
            kept.push(v);
        }
        assert_eq!(kept, vec![5, 7, 9]);
    }

    #[test]
    fn adjust_top_after_mutation() {
        let mut pq = PriorityQueue::new(4);
        for v in [1, 4, 6] {
            pq.put(v, less);
        }
        if let Some(top) = pq.top_mut() {
            *top = 10;
        }
        pq.adjust_top(less);
        assert_eq!(pq.top(), Some(&4));
    }
}
