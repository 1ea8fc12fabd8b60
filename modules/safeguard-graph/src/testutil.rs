//! Builders for small in-memory graphs used by unit and integration tests.

use safeguard_common::{Annotation, Edge, GraphDocument, Node};

use crate::context::{AnalysisContext, AnnotationMap};

/// Display name that matches none of the suspected-alias name shapes.
pub const PLAIN_NAME: &str = "Alex Morgan";

#[derive(Debug, Default, Clone)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    annotations: AnnotationMap,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with a plain name, a profile image and no annotation.
    pub fn unknown(mut self, id: &str) -> Self {
        self.nodes.push(
            Node::new(id, PLAIN_NAME).with_profile_image(&format!("https://img.example/{id}.jpg")),
        );
        self
    }

    pub fn kid(self, id: &str) -> Self {
        self.unknown(id).annotate(id, Annotation::kid())
    }

    pub fn adult(self, id: &str) -> Self {
        self.unknown(id).annotate(id, Annotation::adult())
    }

    pub fn convicted_adult(self, id: &str) -> Self {
        self.unknown(id).annotate(id, Annotation::adult().convicted())
    }

    /// Convicted node with no demographic annotation.
    pub fn convicted(self, id: &str) -> Self {
        self.unknown(id).annotate(id, Annotation::default().convicted())
    }

    /// Adult whose profile has no image, which marks it as a suspected alias.
    pub fn alias_adult(mut self, id: &str) -> Self {
        self.nodes.push(Node::new(id, PLAIN_NAME));
        self.annotate(id, Annotation::adult())
    }

    pub fn named(mut self, id: &str, name: &str) -> Self {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.name = name.to_string();
        }
        self
    }

    pub fn pagerank(mut self, id: &str, pagerank: f64) -> Self {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.pagerank = pagerank;
        }
        self
    }

    pub fn annotate(mut self, id: &str, annotation: Annotation) -> Self {
        self.annotations.insert(id.to_string(), annotation);
        self
    }

    pub fn edge(mut self, a: &str, b: &str) -> Self {
        self.edges.push(Edge::new(a, b));
        self
    }

    /// Connect `hub` to every node in `others`.
    pub fn star(mut self, hub: &str, others: &[&str]) -> Self {
        for other in others {
            self.edges.push(Edge::new(hub, other));
        }
        self
    }

    pub fn documents(&self) -> (GraphDocument, AnnotationMap) {
        (
            GraphDocument {
                nodes: self.nodes.clone(),
                edges: self.edges.clone(),
            },
            self.annotations.clone(),
        )
    }

    pub fn build(&self) -> AnalysisContext {
        let (graph, annotations) = self.documents();
        AnalysisContext::new(graph, annotations)
    }
}

/// The reference scenario: `kid1` is a direct friend of the convicted adult
/// `predator1` and of `targeting1`, an adult whose categorized friends are all
/// kids (four kids plus one uncategorized profile).
pub fn fixture_scenario() -> GraphBuilder {
    GraphBuilder::new()
        .kid("kid1")
        .kid("kid2")
        .kid("kid3")
        .kid("kid4")
        .kid("kid5")
        .convicted_adult("predator1")
        .adult("targeting1")
        .adult("parent1")
        .unknown("friend1")
        .edge("kid1", "predator1")
        .star("targeting1", &["kid1", "kid2", "kid3", "kid4", "friend1"])
        .edge("kid5", "parent1")
}
