//! Molecule extraction: connected components of the per-step bond graph.

/// Union-find with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// Partitions `atom_count` atoms into molecules given undirected bond edges
/// (0-based indices). Every atom lands in exactly one molecule; atoms
/// without bonds form singletons.
///
/// Output is canonical regardless of edge iteration order: each molecule's
/// atoms ascend, and molecules are ordered by their first atom.
pub fn molecules(
    atom_count: usize,
    edges: impl IntoIterator<Item = (usize, usize)>,
) -> Vec<Vec<usize>> {
    let mut set = DisjointSet::new(atom_count);
    for (i, j) in edges {
        set.union(i, j);
    }

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); atom_count];
    for atom in 0..atom_count {
        let root = set.find(atom);
        groups[root].push(atom);
    }
    // Ascending order within each group falls out of the 0..n scan; dropping
    // empty roots keeps molecules ordered by first atom.
    groups.retain(|g| !g.is_empty());
    groups
}

/// Convenience over a per-atom adjacency list.
pub fn molecules_from_adjacency(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let edges = adjacency
        .iter()
        .enumerate()
        .flat_map(|(i, neighbors)| neighbors.iter().map(move |&j| (i, j)));
    molecules(adjacency.len(), edges)
}
