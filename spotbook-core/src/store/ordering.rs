//! Sibling Ordering
//!
//! Display orders are not unique: a delete followed by an add can leave two
//! siblings with the same value. Exchanging two such siblings renumbers the
//! whole list instead.

/// Order updates that exchange the positions of `a` and `b` among `siblings`
/// (given in display order). Returns only the entries whose order changes.
pub fn swap_positions<I: Copy + Eq>(siblings: &[(I, i32)], a: I, b: I) -> Vec<(I, i32)> {
    let find = |id: I| siblings.iter().position(|(sibling, _)| *sibling == id);
    let (Some(ia), Some(ib)) = (find(a), find(b)) else {
        return Vec::new();
    };
    if ia == ib {
        return Vec::new();
    }

    let (order_a, order_b) = (siblings[ia].1, siblings[ib].1);
    if order_a != order_b {
        return vec![(a, order_b), (b, order_a)];
    }

    let mut renumbered: Vec<I> = siblings.iter().map(|(id, _)| *id).collect();
    renumbered.swap(ia, ib);
    renumbered
        .into_iter()
        .zip(0..)
        .filter(|(id, order)| {
            siblings
                .iter()
                .find(|(sibling, _)| sibling == id)
                .is_some_and(|(_, current)| current != order)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_orders_are_exchanged() {
        let siblings = [('a', 0), ('b', 3), ('c', 7)];
        assert_eq!(swap_positions(&siblings, 'c', 'b'), [('c', 3), ('b', 7)]);
    }

    #[test]
    fn test_equal_orders_renumber_the_list() {
        // Spot at 1 deleted, then a new one appended with the count (2)
        let siblings = [('a', 0), ('b', 2), ('c', 2)];
        assert_eq!(swap_positions(&siblings, 'c', 'b'), [('c', 1)]);

        let siblings = [('a', 0), ('b', 0), ('c', 0)];
        assert_eq!(swap_positions(&siblings, 'a', 'b'), [('a', 1), ('c', 2)]);
    }

    #[test]
    fn test_unknown_or_same_sibling_is_a_no_op() {
        let siblings = [('a', 0), ('b', 1)];
        assert!(swap_positions(&siblings, 'a', 'z').is_empty());
        assert!(swap_positions(&siblings, 'a', 'a').is_empty());
    }
}
