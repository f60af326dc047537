//! Clusterer (spec §4.9): groups sequences connected by surviving pairs at
//! or above `clustering_threshold` into duplicate groups via union-find.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use crate::types::{DuplicateCluster, SequenceSummary, StatementSequence};

/// One surviving pair edge, indexing into the `sequences` slice passed to
/// [`cluster`].
#[derive(Debug, Clone, Copy)]
pub struct PairEdge {
    pub a: usize,
    pub b: usize,
    pub overall: f64,
}

/// Builds duplicate clusters from connected components of edges whose
/// `overall` meets `clustering_threshold` (spec §4.9). Within a component,
/// the primary is the sequence earliest by [`StatementSequence::seq_order`];
/// every other member becomes a listed duplicate. Clusters are returned
/// sorted by `estimated_loc_reduction` descending, singletons dropped.
pub fn cluster(
    sequences: &[StatementSequence],
    edges: &[PairEdge],
    clustering_threshold: f64,
) -> Vec<DuplicateCluster> {
    let mut uf = UnionFind::new(sequences.len());
    for edge in edges {
        if edge.overall >= clustering_threshold {
            uf.union(edge.a, edge.b);
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..sequences.len() {
        groups.entry(uf.find(idx)).or_default().push(idx);
    }

    let mut clusters: Vec<DuplicateCluster> = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|mut members| {
            members.sort_by(|&a, &b| sequences[a].seq_order().cmp(&sequences[b].seq_order()));
            let primary_idx = members[0];
            let duplicate_idxs = &members[1..];

            let primary = SequenceSummary::from(&sequences[primary_idx]);
            let duplicates: Vec<SequenceSummary> = duplicate_idxs
                .iter()
                .map(|&idx| SequenceSummary::from(&sequences[idx]))
                .collect();

            let primary_size = sequences[primary_idx].len() as i64;
            let n_duplicates = duplicate_idxs.len() as i64;
            // spec §4.9: removing each duplicate's body and replacing its
            // call site costs one line, so net savings is the duplicated
            // lines minus the one-line call site per duplicate, minus one
            // more for the extracted helper's own signature line.
            let estimated_loc_reduction = n_duplicates * primary_size - n_duplicates - 1;

            DuplicateCluster {
                primary,
                duplicates,
                recommendation: Some(format!(
                    "Extract a shared helper for {} near-identical occurrence(s); estimated {} line(s) saved.",
                    n_duplicates + 1,
                    estimated_loc_reduction.max(0),
                )),
                estimated_loc_reduction,
            }
        })
        .collect();

    clusters.sort_by(|a, b| b.estimated_loc_reduction.cmp(&a.estimated_loc_reduction));
    clusters
}
