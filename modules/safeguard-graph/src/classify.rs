//! Demographic, conviction and alias buckets for every node.

use std::sync::LazyLock;

use regex::Regex;

use safeguard_common::{Demographic, Node};

use crate::context::AnalysisContext;

static FIRST_LAST_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+\s+[A-Za-z]+\s+\d{4}$").unwrap());
static WORD_SHORT_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+\s+[A-Za-z]{1,3}$").unwrap());
static LETTERS_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+\d+$").unwrap());
static GENERATIONAL_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+\s+[A-Za-z]+\s+(?:Jr|Sr|II|III)\.?$").unwrap());

/// Heuristic for profiles that look like throwaway or alias accounts.
pub fn is_suspected_alias(node: &Node) -> bool {
    let name = node.name.trim();
    let lowered = name.to_lowercase();

    FIRST_LAST_YEAR_RE.is_match(name)
        || WORD_SHORT_WORD_RE.is_match(name)
        || LETTERS_DIGITS_RE.is_match(name)
        || GENERATIONAL_SUFFIX_RE.is_match(name)
        || lowered.contains("fake")
        || lowered.contains("alias")
        || !node.has_profile_image()
}

/// Buckets assigned to one node. Demographic, conviction and alias status
/// are independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeClass {
    pub demographic: Demographic,
    pub convicted: bool,
    pub suspected_alias: bool,
}

impl NodeClass {
    pub fn is_kid(&self) -> bool {
        self.demographic == Demographic::Kids
    }

    pub fn is_adult(&self) -> bool {
        self.demographic == Demographic::Adult
    }
}

/// Counts of a node's neighbors per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighborMix {
    pub kids: usize,
    pub adults: usize,
    pub unknown: usize,
    pub convicted: usize,
    /// Adults that are also convicted; included in `adults`.
    pub convicted_adults: usize,
    pub aliases: usize,
}

impl NeighborMix {
    pub fn total(&self) -> usize {
        self.kids + self.adults + self.unknown
    }

    /// kids / (kids + unconvicted adults); `None` when no such neighbor exists.
    /// Convicted adults are left out so a conviction nearby never dilutes the ratio.
    pub fn kid_ratio(&self) -> Option<f64> {
        let categorized = self.kids + self.adults - self.convicted_adults;
        if categorized == 0 {
            return None;
        }
        Some(self.kids as f64 / categorized as f64)
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    classes: Vec<NodeClass>,
}

impl Classification {
    pub fn class(&self, idx: usize) -> NodeClass {
        self.classes[idx]
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn kids(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices(|c| c.is_kid())
    }

    pub fn adults(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices(|c| c.is_adult())
    }

    pub fn unknown(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices(|c| c.demographic == Demographic::Unknown)
    }

    pub fn convicted(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices(|c| c.convicted)
    }

    pub fn aliases(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices(|c| c.suspected_alias)
    }

    pub fn neighbor_mix(&self, ctx: &AnalysisContext, idx: usize) -> NeighborMix {
        let mut mix = NeighborMix::default();
        for &n in ctx.neighbors(idx) {
            let class = self.classes[n];
            match class.demographic {
                Demographic::Kids => mix.kids += 1,
                Demographic::Adult => mix.adults += 1,
                Demographic::Unknown => mix.unknown += 1,
            }
            if class.convicted {
                mix.convicted += 1;
                if class.is_adult() {
                    mix.convicted_adults += 1;
                }
            }
            if class.suspected_alias {
                mix.aliases += 1;
            }
        }
        mix
    }

    fn indices<F>(&self, pred: F) -> impl Iterator<Item = usize> + '_
    where
        F: Fn(&NodeClass) -> bool + 'static,
    {
        self.classes
            .iter()
            .enumerate()
            .filter(move |&(_, c)| pred(c))
            .map(|(i, _)| i)
    }
}

/// Classify every node. A missing annotation leaves the node `unknown`
/// and unconvicted.
pub fn classify_nodes(ctx: &AnalysisContext) -> Classification {
    let classes = (0..ctx.node_count())
        .map(|idx| {
            let annotation = ctx.annotation(idx);
            let demographic = annotation
                .and_then(|a| a.demographic)
                .unwrap_or(Demographic::Unknown);
            let convicted = annotation
                .is_some_and(|a| a.is_confirmed_conviction() || a.is_high_risk());
            NodeClass {
                demographic,
                convicted,
                suspected_alias: is_suspected_alias(ctx.node(idx)),
            }
        })
        .collect();
    Classification { classes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::GraphBuilder;
    use safeguard_common::{Annotation, RiskTag};

    fn with_image(name: &str) -> Node {
        Node::new("https://fb.example/x", name).with_profile_image("https://img.example/x.jpg")
    }

    #[test]
    fn alias_name_shapes() {
        assert!(is_suspected_alias(&with_image("Jamie Stone 1987")));
        assert!(is_suspected_alias(&with_image("Jamie Lo")));
        assert!(is_suspected_alias(&with_image("jamie99")));
        assert!(is_suspected_alias(&with_image("Jamie Stone Jr")));
        assert!(is_suspected_alias(&with_image("Jamie Stone III")));
        assert!(is_suspected_alias(&with_image("Not A Fake Person")));
        assert!(is_suspected_alias(&with_image("Alias Account Here")));
    }

    #[test]
    fn ordinary_name_with_image_is_not_alias() {
        assert!(!is_suspected_alias(&with_image("Jamie Stone")));
        assert!(!is_suspected_alias(&with_image("Mary Ann Whitfield")));
    }

    #[test]
    fn missing_image_marks_alias() {
        assert!(is_suspected_alias(&Node::new("x", "Jamie Stone")));
    }

    #[test]
    fn buckets_are_independent() {
        let ctx = GraphBuilder::new()
            .kid("k")
            .alias_adult("a")
            .unknown("u")
            .annotate("a", Annotation::adult().convicted())
            .build();
        let classes = classify_nodes(&ctx);
        assert!(classes.class(0).is_kid());
        let a = classes.class(1);
        assert!(a.is_adult() && a.convicted && a.suspected_alias);
        assert_eq!(classes.class(2).demographic, Demographic::Unknown);
        assert!(!classes.class(2).convicted);
    }

    #[test]
    fn high_risk_counts_as_convicted() {
        let ctx = GraphBuilder::new()
            .unknown("r")
            .annotate("r", Annotation::default().with_risk(RiskTag::High))
            .build();
        assert!(classify_nodes(&ctx).class(0).convicted);
    }

    #[test]
    fn neighbor_mix_ratio_ignores_uncategorized() {
        let ctx = GraphBuilder::new()
            .adult("hub")
            .kid("k1")
            .kid("k2")
            .adult("a1")
            .unknown("u1")
            .star("hub", &["k1", "k2", "a1", "u1"])
            .build();
        let classes = classify_nodes(&ctx);
        let mix = classes.neighbor_mix(&ctx, 0);
        assert_eq!(mix.total(), 4);
        assert_eq!(mix.kid_ratio(), Some(2.0 / 3.0));
        assert_eq!(NeighborMix::default().kid_ratio(), None);
    }

    #[test]
    fn convicted_adults_do_not_dilute_kid_ratio() {
        let ctx = GraphBuilder::new()
            .adult("hub")
            .kid("k1")
            .adult("a1")
            .convicted_adult("p1")
            .star("hub", &["k1", "a1", "p1"])
            .build();
        let classes = classify_nodes(&ctx);
        let mix = classes.neighbor_mix(&ctx, 0);
        assert_eq!(mix.adults, 2);
        assert_eq!(mix.convicted_adults, 1);
        assert_eq!(mix.kid_ratio(), Some(0.5));

        let lone = GraphBuilder::new()
            .adult("hub")
            .convicted_adult("p1")
            .edge("hub", "p1")
            .build();
        assert_eq!(classify_nodes(&lone).neighbor_mix(&lone, 0).kid_ratio(), None);
    }
}
