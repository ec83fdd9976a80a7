mod common;

use std::sync::Arc;

use braidflow::graphs::{BuildError, EdgeSpec, GraphBuilder};
use braidflow::node::NodeSpec;
use braidflow::transform::{JoinResponses, SplitTags, TemplateQuery, Transform, TransformContext};
use braidflow::types::{branch_key, AgentRole};
use common::*;
use proptest::prelude::*;
use serde_json::{json, Value};

fn empty_ctx() -> TransformContext<'static> {
    TransformContext {
        query: "",
        nodes: &[],
        history: &[],
    }
}

fn block_on<F: std::future::Future<Output = ()>>(fut: F) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(fut);
}

proptest! {
    #[test]
    fn branch_keys_parse_back_to_their_parts(
        id in "[a-z][a-z0-9_]{0,12}",
        index in 0usize..512,
    ) {
        let key = branch_key(&id, Some(index));
        let (node, branch) = key.split_once('#').expect("branch keys contain a separator");
        prop_assert_eq!(node, id);
        prop_assert_eq!(branch.parse::<usize>().unwrap(), index);
    }

    #[test]
    fn plain_keys_pass_through_unchanged(id in "[a-z][a-z0-9_]{0,12}") {
        prop_assert_eq!(branch_key(&id, None), id);
    }

    #[test]
    fn split_tags_inverts_tag_wrapping(items in proptest::collection::vec("[a-z ]{0,16}", 0..8)) {
        let wrapped: String = items.iter().map(|item| format!("<q>{item}</q>")).collect();

        let out = SplitTags::new("q")
            .apply(Value::String(wrapped), &empty_ctx())
            .unwrap();

        let expected: Vec<Value> = items
            .iter()
            .map(|item| Value::String(item.trim().to_owned()))
            .collect();
        prop_assert_eq!(out, Value::Array(expected));
    }

    #[test]
    fn join_skips_null_slots_and_keeps_order(
        slots in proptest::collection::vec(proptest::option::of("[a-z]{1,8}"), 1..8),
    ) {
        let payload = Value::Array(
            slots
                .iter()
                .map(|slot| match slot {
                    Some(text) => Value::String(text.clone()),
                    None => Value::Null,
                })
                .collect(),
        );

        let joined = JoinResponses::new("|").apply(payload, &empty_ctx()).unwrap();
        let joined = joined.as_str().unwrap();

        let expected = slots
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("|");
        prop_assert_eq!(joined, expected.as_str());
    }

    #[test]
    fn templates_render_query_and_input(
        query in "[a-z ]{0,12}",
        input in "[a-z ]{0,12}",
    ) {
        let ctx = TransformContext { query: &query, nodes: &[], history: &[] };

        let out = TemplateQuery::new("Q={query};I={input}")
            .apply(Value::String(input.clone()), &ctx)
            .unwrap();

        prop_assert_eq!(out, Value::String(format!("Q={query};I={input}")));
    }

    #[test]
    fn linear_chains_always_compile(len in 2usize..24) {
        let ids: Vec<String> = (0..len).map(|i| format!("node_{i}")).collect();
        let mut builder = GraphBuilder::new();
        for id in &ids {
            builder = builder.add_node(NodeSpec::new(id.clone(), AgentRole::Assistant));
        }
        for pair in ids.windows(2) {
            builder = builder.add_edge(pair[0].clone(), pair[1].clone());
        }

        let workflow = builder.compile().unwrap();
        prop_assert_eq!(workflow.node_count(), len);
        prop_assert_eq!(workflow.edge_count(), len - 1);
    }

    #[test]
    fn back_edges_are_always_rejected(
        (len, from, to) in (2usize..16).prop_flat_map(|len| (Just(len), 0..len, 0..len)),
    ) {
        prop_assume!(to <= from);
        let ids: Vec<String> = (0..len).map(|i| format!("node_{i}")).collect();
        let mut builder = GraphBuilder::new();
        for id in &ids {
            builder = builder.add_node(NodeSpec::new(id.clone(), AgentRole::Assistant));
        }
        for pair in ids.windows(2) {
            builder = builder.add_edge(pair[0].clone(), pair[1].clone());
        }
        builder = builder.add_edge(ids[from].clone(), ids[to].clone());

        let result = builder.compile();
        let is_cycle_error = matches!(result, Err(BuildError::CycleDetected { .. }));
        prop_assert!(is_cycle_error);
    }

    #[test]
    fn incoming_edges_sort_by_priority_then_declaration(
        priorities in proptest::collection::vec(-10i32..10, 1..6),
    ) {
        let mut builder = GraphBuilder::new().add_node(NodeSpec::new("sink", AgentRole::Assistant));
        for (index, priority) in priorities.iter().enumerate() {
            let id = format!("src_{index}");
            builder = builder
                .add_node(NodeSpec::new(id.clone(), AgentRole::Assistant))
                .add_edge_spec(EdgeSpec::new(id, "sink").with_priority(*priority));
        }

        let workflow = builder.compile().unwrap();
        let incoming = workflow.incoming("sink");

        let got: Vec<i32> = incoming.iter().map(|edge| edge.spec.priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        prop_assert_eq!(got, sorted);

        for pair in incoming.windows(2) {
            prop_assert!(
                (pair[0].spec.priority(), pair[0].id) <= (pair[1].spec.priority(), pair[1].id)
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn acyclic_workflows_always_run_to_completion(
        branches in 0usize..6,
        tail in 1usize..4,
    ) {
        block_on(async move {
            let questions: String = (0..branches)
                .map(|i| format!("<question>q{i}</question>"))
                .collect();

            let mut builder = GraphBuilder::new()
                .add_node(NodeSpec::new("planner", AgentRole::Planner))
                .add_node(NodeSpec::new("worker", AgentRole::Research))
                .add_edge_spec(
                    EdgeSpec::map("planner", "worker")
                        .with_output_transform(SplitTags::new("question")),
                );
            let mut previous = String::from("worker");
            for step in 0..tail {
                let id = format!("tail_{step}");
                let mut spec = NodeSpec::new(id.clone(), AgentRole::Assistant);
                if step == tail - 1 {
                    spec = spec.with_return_output(true);
                }
                builder = builder.add_node(spec);
                builder = if step == 0 {
                    builder.add_edge_spec(
                        EdgeSpec::reduce("worker", id.clone())
                            .with_output_transform(JoinResponses::new(" | ")),
                    )
                } else {
                    builder.add_edge(previous, id.clone())
                };
                previous = id;
            }
            let workflow = builder.compile().unwrap();

            let model = Arc::new(
                StubModel::new()
                    .reply("planning agent", &questions)
                    .reply("", "ok"),
            );
            let finished = silent_executor(workflow, model)
                .execute("planner", json!("probe"), thread())
                .await
                .unwrap();

            assert_eq!(finished.results.len(), 1 + branches + tail);
            assert_eq!(finished.output, "ok");
        });
    }
}
