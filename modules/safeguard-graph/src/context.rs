use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use tracing::{debug, info};

use safeguard_common::{Annotation, GraphDocument, Node, SafeguardError};

/// Annotation document: node url -> annotation.
pub type AnnotationMap = HashMap<String, Annotation>;

/// Read and parse the graph document.
pub fn load_graph(path: &Path) -> Result<GraphDocument, SafeguardError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SafeguardError::Input(format!("cannot read graph document {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        SafeguardError::Input(format!("malformed graph document {}: {e}", path.display()))
    })
}

/// Read and parse the annotation document.
pub fn load_annotations(path: &Path) -> Result<AnnotationMap, SafeguardError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SafeguardError::Input(format!(
            "cannot read annotation document {}: {e}",
            path.display()
        ))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        SafeguardError::Input(format!(
            "malformed annotation document {}: {e}",
            path.display()
        ))
    })
}

/// Graph, annotations and adjacency index for one analysis cycle.
///
/// Nodes are addressed internally by their position in the input document;
/// neighbor lists are sorted and de-duplicated so every traversal visits
/// nodes in the same order on every run.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    annotations: AnnotationMap,
    edge_count: usize,
}

impl AnalysisContext {
    pub fn new(graph: GraphDocument, annotations: AnnotationMap) -> Self {
        let mut nodes = Vec::with_capacity(graph.nodes.len());
        let mut index = HashMap::with_capacity(graph.nodes.len());

        for node in graph.nodes {
            if index.contains_key(&node.id) {
                debug!(id = node.id.as_str(), "Skipping duplicate node id");
                continue;
            }
            index.insert(node.id.clone(), nodes.len());
            nodes.push(node);
        }

        let mut neighbor_sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nodes.len()];
        for edge in &graph.edges {
            let (Some(&a), Some(&b)) = (index.get(&edge.source), index.get(&edge.target)) else {
                debug!(
                    source = edge.source.as_str(),
                    target = edge.target.as_str(),
                    "Skipping edge with unknown endpoint"
                );
                continue;
            };
            if a == b {
                continue;
            }
            neighbor_sets[a].insert(b);
            neighbor_sets[b].insert(a);
        }

        let edge_count = neighbor_sets.iter().map(|s| s.len()).sum::<usize>() / 2;
        let adjacency = neighbor_sets
            .into_iter()
            .map(|s| s.into_iter().collect())
            .collect();

        Self {
            nodes,
            index,
            adjacency,
            annotations,
            edge_count,
        }
    }

    /// Load both input documents. Any read or parse failure is an input error.
    pub fn load(graph_path: &Path, annotations_path: &Path) -> Result<Self, SafeguardError> {
        let graph = load_graph(graph_path)?;
        let annotations = load_annotations(annotations_path)?;
        let ctx = Self::new(graph, annotations);
        info!(
            nodes = ctx.node_count(),
            edges = ctx.edge_count(),
            annotations = ctx.annotations.len(),
            "Loaded analysis inputs"
        );
        Ok(ctx)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.nodes[idx].id
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.nodes[idx].name
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.adjacency[idx]
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.adjacency[idx].len()
    }

    pub fn annotation(&self, idx: usize) -> Option<&Annotation> {
        self.annotations.get(&self.nodes[idx].id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeguard_common::Edge;

    fn doc(nodes: &[&str], edges: &[(&str, &str)]) -> GraphDocument {
        GraphDocument {
            nodes: nodes.iter().map(|id| Node::new(id, id)).collect(),
            edges: edges.iter().map(|(a, b)| Edge::new(a, b)).collect(),
        }
    }

    #[test]
    fn adjacency_is_undirected_and_deduplicated() {
        let ctx = AnalysisContext::new(
            doc(&["a", "b", "c"], &[("a", "b"), ("b", "a"), ("b", "c")]),
            AnnotationMap::new(),
        );
        let b = ctx.index_of("b").unwrap();
        assert_eq!(ctx.degree(b), 2);
        assert_eq!(ctx.edge_count(), 2);
        assert_eq!(ctx.neighbors(ctx.index_of("a").unwrap()), &[b]);
    }

    #[test]
    fn self_loops_and_dangling_edges_are_ignored() {
        let ctx = AnalysisContext::new(
            doc(&["a", "b"], &[("a", "a"), ("a", "ghost"), ("a", "b")]),
            AnnotationMap::new(),
        );
        assert_eq!(ctx.edge_count(), 1);
        assert_eq!(ctx.degree(0), 1);
    }

    #[test]
    fn duplicate_node_ids_keep_first() {
        let mut graph = doc(&["a", "a"], &[]);
        graph.nodes[1].name = "second".to_string();
        let ctx = AnalysisContext::new(graph, AnnotationMap::new());
        assert_eq!(ctx.node_count(), 1);
        assert_eq!(ctx.name(0), "a");
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = load_graph(Path::new("/nonexistent/graph.json")).unwrap_err();
        assert!(matches!(err, SafeguardError::Input(_)));
    }

    #[test]
    fn malformed_json_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_annotations(&path).unwrap_err();
        assert!(matches!(err, SafeguardError::Input(msg) if msg.contains("malformed")));
    }
}
