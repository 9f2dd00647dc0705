use std::cmp::Ordering;
use std::collections::BinaryHeap;

use align_core::Descriptor;
use rand::seq::SliceRandom;
use rand::Rng;

/// Points used to estimate the per-dimension spread at a node
const SAMPLE_MEAN: usize = 100;
/// Split dimension is drawn among this many highest-variance dimensions
const RAND_DIM: usize = 5;

#[derive(Debug)]
enum Node {
    /// One point, or several points that cannot be separated
    Leaf(Vec<usize>),
    Split {
        dim: usize,
        value: f32,
        left: usize,
        right: usize,
    },
}

#[derive(Debug)]
struct KdTree {
    nodes: Vec<Node>,
    root: usize,
}

/// Unexplored subtree waiting in the best-bin-first queue
#[derive(Debug, Clone, Copy)]
struct Branch {
    bound: f32,
    tree: usize,
    node: usize,
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Branch {}

impl Ord for Branch {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on the bound
        other
            .bound
            .total_cmp(&self.bound)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded, sorted list of the best candidates seen so far
struct TopK {
    k: usize,
    items: Vec<(f32, usize)>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k + 1),
        }
    }

    fn push(&mut self, dist: f32, idx: usize) {
        let key = (dist, idx);
        let less = |a: &(f32, usize), b: &(f32, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        if self.items.len() == self.k {
            match self.items.last() {
                Some(worst) if less(&key, worst) == Ordering::Less => {}
                _ => return,
            }
        }
        let pos = self
            .items
            .partition_point(|item| less(item, &key) == Ordering::Less);
        self.items.insert(pos, key);
        self.items.truncate(self.k);
    }
}

/// Forest of randomized KD-trees over a borrowed descriptor set
#[derive(Debug)]
pub struct KdForest<'a> {
    data: &'a [Descriptor],
    trees: Vec<KdTree>,
}

impl<'a> KdForest<'a> {
    /// Build `n_trees` independently randomized trees over `data`
    pub fn build<R: Rng + ?Sized>(data: &'a [Descriptor], n_trees: usize, rng: &mut R) -> Self {
        let trees = (0..n_trees)
            .map(|_| {
                let mut indices: Vec<usize> = (0..data.len()).collect();
                indices.shuffle(rng);
                let mut nodes = Vec::with_capacity(2 * data.len());
                let root = build_node(&mut nodes, data, &mut indices, rng);
                KdTree { nodes, root }
            })
            .collect();
        Self { data, trees }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Approximate `k` nearest neighbours of `query` as `(index, squared distance)`,
    /// closest first.
    ///
    /// Every tree is descended once to a leaf before the check budget applies;
    /// after that, branches are explored in order of their lower bound until
    /// `checks` distinct points have been examined.
    pub fn knn(&self, query: &Descriptor, k: usize, checks: usize) -> Vec<(usize, f32)> {
        let mut search = Search {
            forest: self,
            query,
            heap: BinaryHeap::new(),
            visited: vec![false; self.data.len()],
            best: TopK::new(k),
            checked: 0,
        };

        for (t, tree) in self.trees.iter().enumerate() {
            search.descend(t, tree.root, 0.0);
        }
        while search.checked < checks {
            match search.heap.pop() {
                Some(branch) => search.descend(branch.tree, branch.node, branch.bound),
                None => break,
            }
        }

        search.best.items.into_iter().map(|(d, i)| (i, d)).collect()
    }
}

struct Search<'f, 'a> {
    forest: &'f KdForest<'a>,
    query: &'f Descriptor,
    heap: BinaryHeap<Branch>,
    visited: Vec<bool>,
    best: TopK,
    checked: usize,
}

impl Search<'_, '_> {
    fn descend(&mut self, tree: usize, mut node: usize, bound: f32) {
        let forest = self.forest;
        let nodes = &forest.trees[tree].nodes;
        loop {
            match &nodes[node] {
                Node::Leaf(points) => {
                    for &idx in points {
                        if self.visited[idx] {
                            continue;
                        }
                        self.visited[idx] = true;
                        self.checked += 1;
                        self.best.push(squared_distance(self.query, &forest.data[idx]), idx);
                    }
                    return;
                }
                Node::Split {
                    dim,
                    value,
                    left,
                    right,
                } => {
                    let diff = self.query[*dim] - value;
                    let (near, far) = if diff < 0.0 { (*left, *right) } else { (*right, *left) };
                    self.heap.push(Branch {
                        bound: bound + diff * diff,
                        tree,
                        node: far,
                    });
                    node = near;
                }
            }
        }
    }
}

pub fn squared_distance(a: &Descriptor, b: &Descriptor) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn build_node<R: Rng + ?Sized>(
    nodes: &mut Vec<Node>,
    data: &[Descriptor],
    indices: &mut [usize],
    rng: &mut R,
) -> usize {
    let id = nodes.len();
    let split = if indices.len() > 1 {
        choose_split(data, indices, rng)
    } else {
        None
    };
    let (dim, value) = match split {
        Some(s) => s,
        None => {
            nodes.push(Node::Leaf(indices.to_vec()));
            return id;
        }
    };

    let mut left_end = 0;
    for i in 0..indices.len() {
        if data[indices[i]][dim] < value {
            indices.swap(i, left_end);
            left_end += 1;
        }
    }
    if left_end == 0 || left_end == indices.len() {
        nodes.push(Node::Leaf(indices.to_vec()));
        return id;
    }

    nodes.push(Node::Leaf(Vec::new()));
    let (lo, hi) = indices.split_at_mut(left_end);
    let left = build_node(nodes, data, lo, rng);
    let right = build_node(nodes, data, hi, rng);
    nodes[id] = Node::Split {
        dim,
        value,
        left,
        right,
    };
    id
}

/// Random high-variance dimension and its mean, or `None` when all points coincide
fn choose_split<R: Rng + ?Sized>(
    data: &[Descriptor],
    indices: &[usize],
    rng: &mut R,
) -> Option<(usize, f32)> {
    let sample = &indices[..indices.len().min(SAMPLE_MEAN)];
    let (mut mean, mut var) = spread(data, sample);
    if var.iter().all(|&v| v <= 0.0) && sample.len() < indices.len() {
        (mean, var) = spread(data, indices);
    }

    let mut dims: Vec<usize> = (0..var.len()).filter(|&d| var[d] > 0.0).collect();
    if dims.is_empty() {
        return None;
    }
    dims.sort_by(|&a, &b| var[b].total_cmp(&var[a]).then(a.cmp(&b)));
    dims.truncate(RAND_DIM);
    let dim = dims[rng.random_range(0..dims.len())];
    Some((dim, mean[dim] as f32))
}

fn spread(data: &[Descriptor], indices: &[usize]) -> (Vec<f64>, Vec<f64>) {
    let dims = data[indices[0]].len();
    let n = indices.len() as f64;
    let mut mean = vec![0.0f64; dims];
    for &i in indices {
        for (m, &v) in mean.iter_mut().zip(data[i].iter()) {
            *m += v as f64;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let mut var = vec![0.0f64; dims];
    for &i in indices {
        for ((s, &v), m) in var.iter_mut().zip(data[i].iter()).zip(&mean) {
            let d = v as f64 - m;
            *s += d * d;
        }
    }
    (mean, var)
}
