//! Buchheim–Jünger–Leipert linear-time tidy tree pass.
//!
//! Input is an arena of child lists where index `0` is the root. Output is one
//! horizontal centre per node, with the root pinned at `0`. Every pair of
//! neighbouring contour nodes (siblings or cousins) is kept at least
//! `separation` apart, which with uniform node boxes guarantees subtrees never
//! overlap.

#[derive(Debug, Clone)]
struct TidySlot {
    parent: Option<usize>,
    /// 1-based position among siblings.
    number: usize,
    prelim: f64,
    modifier: f64,
    thread: Option<usize>,
    ancestor: usize,
    shift: f64,
    change: f64,
}

struct TidyPass<'a> {
    children: &'a [Vec<usize>],
    slots: Vec<TidySlot>,
    separation: f64,
}

pub fn tidy_positions(children: &[Vec<usize>], separation: f64) -> Vec<f64> {
    if children.is_empty() {
        return Vec::new();
    }

    let mut slots = (0..children.len())
        .map(|index| TidySlot {
            parent: None,
            number: 1,
            prelim: 0.0,
            modifier: 0.0,
            thread: None,
            ancestor: index,
            shift: 0.0,
            change: 0.0,
        })
        .collect::<Vec<_>>();
    for (parent, kids) in children.iter().enumerate() {
        for (position, &child) in kids.iter().enumerate() {
            slots[child].parent = Some(parent);
            slots[child].number = position + 1;
        }
    }

    let mut pass = TidyPass {
        children,
        slots,
        separation,
    };
    pass.first_walk(0);

    let mut xs = vec![0.0; children.len()];
    pass.second_walk(0, 0.0, &mut xs);
    let root_x = xs[0];
    for x in &mut xs {
        *x -= root_x;
    }
    xs
}

impl TidyPass<'_> {
    fn left_sibling(&self, v: usize) -> Option<usize> {
        let parent = self.slots[v].parent?;
        let number = self.slots[v].number;
        (number > 1).then(|| self.children[parent][number - 2])
    }

    fn leftmost_sibling(&self, v: usize) -> usize {
        self.slots[v]
            .parent
            .and_then(|parent| self.children[parent].first().copied())
            .unwrap_or(v)
    }

    fn next_left(&self, v: usize) -> Option<usize> {
        self.children[v].first().copied().or(self.slots[v].thread)
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.children[v].last().copied().or(self.slots[v].thread)
    }

    fn first_walk(&mut self, v: usize) {
        let children = self.children;
        let kids = children[v].as_slice();
        let (Some(&first), Some(&last)) = (kids.first(), kids.last()) else {
            self.slots[v].prelim = self
                .left_sibling(v)
                .map_or(0.0, |w| self.slots[w].prelim + self.separation);
            return;
        };

        let mut default_ancestor = first;
        for &child in kids {
            self.first_walk(child);
            default_ancestor = self.apportion(child, default_ancestor);
        }
        self.execute_shifts(v);

        let midpoint = (self.slots[first].prelim + self.slots[last].prelim) / 2.0;
        match self.left_sibling(v) {
            Some(w) => {
                self.slots[v].prelim = self.slots[w].prelim + self.separation;
                self.slots[v].modifier = self.slots[v].prelim - midpoint;
            }
            None => self.slots[v].prelim = midpoint,
        }
    }

    fn apportion(&mut self, v: usize, mut default_ancestor: usize) -> usize {
        let Some(w) = self.left_sibling(v) else {
            return default_ancestor;
        };

        // inner/outer contours on the right (`plus`) and left (`minus`) side.
        let mut inner_plus = v;
        let mut outer_plus = v;
        let mut inner_minus = w;
        let mut outer_minus = self.leftmost_sibling(v);
        let mut s_inner_plus = self.slots[inner_plus].modifier;
        let mut s_outer_plus = self.slots[outer_plus].modifier;
        let mut s_inner_minus = self.slots[inner_minus].modifier;
        let mut s_outer_minus = self.slots[outer_minus].modifier;

        while let (Some(next_minus), Some(next_plus)) =
            (self.next_right(inner_minus), self.next_left(inner_plus))
        {
            inner_minus = next_minus;
            inner_plus = next_plus;
            if let Some(next) = self.next_left(outer_minus) {
                outer_minus = next;
            }
            if let Some(next) = self.next_right(outer_plus) {
                outer_plus = next;
            }
            self.slots[outer_plus].ancestor = v;

            let shift = (self.slots[inner_minus].prelim + s_inner_minus)
                - (self.slots[inner_plus].prelim + s_inner_plus)
                + self.separation;
            if shift > 0.0 {
                let ancestor = self.ancestor(inner_minus, v, default_ancestor);
                self.move_subtree(ancestor, v, shift);
                s_inner_plus += shift;
                s_outer_plus += shift;
            }

            s_inner_minus += self.slots[inner_minus].modifier;
            s_inner_plus += self.slots[inner_plus].modifier;
            s_outer_minus += self.slots[outer_minus].modifier;
            s_outer_plus += self.slots[outer_plus].modifier;
        }

        if let Some(next) = self.next_right(inner_minus)
            && self.next_right(outer_plus).is_none()
        {
            self.slots[outer_plus].thread = Some(next);
            self.slots[outer_plus].modifier += s_inner_minus - s_outer_plus;
        }
        if let Some(next) = self.next_left(inner_plus)
            && self.next_left(outer_minus).is_none()
        {
            self.slots[outer_minus].thread = Some(next);
            self.slots[outer_minus].modifier += s_inner_plus - s_outer_minus;
            default_ancestor = v;
        }

        default_ancestor
    }

    fn ancestor(&self, inner_minus: usize, v: usize, default_ancestor: usize) -> usize {
        let candidate = self.slots[inner_minus].ancestor;
        if self.slots[candidate].parent == self.slots[v].parent {
            candidate
        } else {
            default_ancestor
        }
    }

    fn move_subtree(&mut self, left: usize, right: usize, shift: f64) {
        let subtrees = self.slots[right]
            .number
            .saturating_sub(self.slots[left].number)
            .max(1) as f64;
        self.slots[right].change -= shift / subtrees;
        self.slots[right].shift += shift;
        self.slots[left].change += shift / subtrees;
        self.slots[right].prelim += shift;
        self.slots[right].modifier += shift;
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        let children = self.children;
        for &child in children[v].iter().rev() {
            self.slots[child].prelim += shift;
            self.slots[child].modifier += shift;
            change += self.slots[child].change;
            shift += self.slots[child].shift + change;
        }
    }

    fn second_walk(&self, v: usize, modifier_sum: f64, xs: &mut [f64]) {
        xs[v] = self.slots[v].prelim + modifier_sum;
        for &child in &self.children[v] {
            self.second_walk(child, modifier_sum + self.slots[v].modifier, xs);
        }
    }
}
