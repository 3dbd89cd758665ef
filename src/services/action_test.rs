use super::*;
use crate::services::selector::StructuredSelector;

// =============================================================================
// canonical_action / strip_code_fences
// =============================================================================

#[test]
fn action_names_canonicalise() {
    assert_eq!(canonical_action("create_rectangle"), Some("createRectangle"));
    assert_eq!(canonical_action("DistributeEvenly"), Some("distributeEvenly"));
    assert_eq!(canonical_action("arrange-grid"), Some("arrangeGrid"));
    assert_eq!(canonical_action("paint"), None);
}

#[test]
fn code_fences_are_stripped() {
    assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fences("```\n[1]\n```  "), "[1]");
    assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
}

// =============================================================================
// parse_action
// =============================================================================

#[test]
fn nested_parameters_win_over_root() {
    let reply = r#"{"action":"createRectangle","x":1,"fill":"blue",
        "properties":{"x":2,"width":120},
        "parameters":{"x":3,"height":"60"}}"#;
    let Some(Action::CreateRectangle(shape)) = parse_action(reply) else {
        panic!("expected createRectangle");
    };
    assert_eq!(shape.x, Some(3.0));
    assert_eq!(shape.width, Some(120.0));
    assert_eq!(shape.height, Some(60.0));
    assert_eq!(shape.fill.as_deref(), Some("blue"));
}

#[test]
fn target_aliases_fold_into_target() {
    let reply = r#"{"action":"deleteObject","parameters":{"objectIds":["a","b"]}}"#;
    let Some(Action::DeleteObject(params)) = parse_action(reply) else {
        panic!("expected deleteObject");
    };
    assert_eq!(
        params.target,
        Some(Selector::Many(vec![Selector::Text("a".into()), Selector::Text("b".into())]))
    );

    let reply = r#"{"action":"moveObject","selector":{"color":"red","type":"circle"},"target":"the square","x":5}"#;
    let Some(Action::MoveObject(params)) = parse_action(reply) else {
        panic!("expected moveObject");
    };
    assert_eq!(params.target, Some(Selector::Text("the square".into())));
}

#[test]
fn structured_target_parses() {
    let reply = r#"{"action":"rotateObject","parameters":{"target":{"color":"red","type":"circle","count":1},"degrees":45}}"#;
    let Some(Action::RotateObject(params)) = parse_action(reply) else {
        panic!("expected rotateObject");
    };
    assert_eq!(params.rotation, Some(45.0));
    assert_eq!(
        params.target,
        Some(Selector::Structured(StructuredSelector {
            description: None,
            color: Some("red".into()),
            kind: Some("circle".into()),
            count: Some(1),
        }))
    );
}

#[test]
fn prose_and_fences_around_json() {
    let reply = "Sure! Here you go:\n```json\n{\"action\": \"undo\", \"parameters\": {\"count\": \"2\"}}\n```";
    assert_eq!(parse_action(reply), Some(Action::Undo(UndoParams { count: Some(2) })));

    let reply = "I'll do that: {\"action\":\"help\"} hope that helps";
    assert_eq!(parse_action(reply), Some(Action::Help {}));
}

#[test]
fn clarify_at_root() {
    let reply = r#"{"action":"clarify","question":"Which circle?","missing":["target"]}"#;
    let Some(Action::Clarify(params)) = parse_action(reply) else {
        panic!("expected clarify");
    };
    assert_eq!(params.question, "Which circle?");
    assert_eq!(params.missing, Some(vec!["target".to_string()]));
}

#[test]
fn distribute_direction_aliases() {
    let reply = r#"{"action":"distributeEvenly","parameters":{"axis":"vertical"}}"#;
    let Some(Action::DistributeEvenly(params)) = parse_action(reply) else {
        panic!("expected distributeEvenly");
    };
    assert_eq!(params.direction, Axis::Vertical);
}

#[test]
fn garbage_is_none() {
    assert_eq!(parse_action("I can't help with that."), None);
    assert_eq!(parse_action(r#"{"action":"paintEverything"}"#), None);
    assert_eq!(parse_action(r#"{"action":"moveObject","parameters":{"target":42}}"#), None);
    assert_eq!(parse_action(""), None);
}

// =============================================================================
// parse_plan
// =============================================================================

#[test]
fn plan_from_bare_array_and_steps() {
    let reply = r#"[{"action":"createCircle","parameters":{"radius":40}},{"action":"arrangeHorizontal"}]"#;
    let plan = parse_plan(reply).unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].name(), "createCircle");

    let reply = r#"{"steps":[{"action":"createText","text":"Title"},{"action":"bogus"},{"action":"arrangeGrid","columns":3}]}"#;
    let plan = parse_plan(reply).unwrap();
    assert_eq!(plan.iter().map(Action::name).collect::<Vec<_>>(), vec!["createText", "arrangeGrid"]);
}

#[test]
fn plan_with_nothing_usable_is_none() {
    assert_eq!(parse_plan(r#"{"steps":[]}"#), None);
    assert_eq!(parse_plan("no plan"), None);
}

#[test]
fn single_object_counts_as_one_step_plan() {
    let plan = parse_plan(r#"{"action":"deleteObject","target":"all circles"}"#).unwrap();
    assert_eq!(plan.len(), 1);
    assert!(plan[0].target().is_some());
}
