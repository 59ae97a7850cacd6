use std::collections::{BTreeMap, BTreeSet};

/// Order `elems` so that every element follows its dependencies.
///
/// Returns the order and every cycle found, each cycle starting and ending
/// with the element closing it. Traversal starts at the elements nobody
/// depends on, in key order, then covers whatever is left.
pub(crate) fn order<T: Ord + Clone>(elems: &BTreeMap<T, BTreeSet<T>>) -> (Vec<T>, Vec<Vec<T>>) {
    let mut walk = Walk {
        elems,
        stack: Vec::new(),
        done: BTreeSet::new(),
        ordered: Vec::new(),
        cycles: Vec::new(),
    };
    let roots: Vec<&T> = elems
        .keys()
        .filter(|key| !elems.values().any(|deps| deps.contains(*key)))
        .collect();
    for elem in roots.into_iter().chain(elems.keys()) {
        walk.visit(elem);
    }
    (walk.ordered, walk.cycles)
}

struct Walk<'a, T> {
    elems: &'a BTreeMap<T, BTreeSet<T>>,
    stack: Vec<T>,
    done: BTreeSet<T>,
    ordered: Vec<T>,
    cycles: Vec<Vec<T>>,
}

impl<T: Ord + Clone> Walk<'_, T> {
    fn visit(&mut self, elem: &T) {
        if let Some(pos) = self.stack.iter().position(|e| e == elem) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(elem.clone());
            self.cycles.push(cycle);
            return;
        }
        if self.done.contains(elem) {
            return;
        }
        self.stack.push(elem.clone());
        if let Some(deps) = self.elems.get(elem) {
            for dep in deps {
                self.visit(dep);
            }
        }
        self.stack.pop();
        self.done.insert(elem.clone());
        self.ordered.push(elem.clone());
    }
}
