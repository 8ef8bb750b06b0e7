use divan::{Bencher, black_box};
use templatesearch::pattern::{Children, SeqItem, SeqMode, SequencePattern};
use templatesearch::{CancelFlag, Literal, Pattern, TemplateGroup, TreeNode, match_pattern, quote};

fn main() {
    divan::main();
}

fn call(name: &str) -> TreeNode {
    TreeNode::branch(
        "method-call",
        vec![TreeNode::literal_leaf(
            "identifier",
            Literal::Ident(name.to_string()),
        )],
    )
}

/// Synthetic corpus: method bodies of varying length over a small alphabet
fn corpus() -> Vec<TreeNode> {
    let names = ["open", "read", "log", "close", "flush"];
    (0..200)
        .map(|i| {
            let calls = (0..(3 + i % 8))
                .map(|j| call(names[(i + j) % names.len()]))
                .collect();
            TreeNode::branch("body", calls)
        })
        .collect()
}

fn subsequence_pattern() -> Pattern {
    Pattern::Concrete {
        kind: "body".to_string(),
        literal: None,
        children: Children::Seq(SequencePattern {
            items: vec![
                SeqItem::required(quote(&call("open"))),
                SeqItem::required(quote(&call("close"))),
            ],
            mode: SeqMode::Subsequence,
        }),
    }
}

/// Benchmark exhaustive matching of a subsequence template over the corpus
#[divan::bench]
fn match_subsequence(bencher: Bencher) {
    let trees = corpus();
    let pattern = subsequence_pattern();
    bencher.bench_local(|| {
        let mut solutions = 0usize;
        for tree in &trees {
            solutions += match_pattern(black_box(&pattern), tree).count();
        }
        black_box(solutions)
    });
}

/// Benchmark a conjunctive group query over the corpus
#[divan::bench]
fn group_query(bencher: Bencher) {
    let trees = corpus();
    let group = TemplateGroup::new("open-close")
        .add_snippet(subsequence_pattern(), Vec::new())
        .add_snippet(
            Pattern::Concrete {
                kind: "body".to_string(),
                literal: None,
                children: Children::Seq(SequencePattern {
                    items: vec![SeqItem::required(quote(&call("log")))],
                    mode: SeqMode::Subsequence,
                }),
            },
            Vec::new(),
        );
    let cancel = CancelFlag::new();
    bencher.bench_local(|| {
        black_box(group.query(black_box(trees.clone()), &cancel).count())
    });
}
