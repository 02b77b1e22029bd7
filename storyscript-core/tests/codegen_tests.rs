use storyscript_core::ast::{AudioChannel, AudioOptions, ImageExtras, MenuExtras, Script};
use storyscript_core::ast::{Branch, Choice};
use storyscript_core::{IdGen, NodeFactory, generate};

fn render(build: impl FnOnce(&NodeFactory) -> Vec<storyscript_core::Stmt>) -> String {
    let ids = IdGen::new();
    let factory = NodeFactory::new(&ids);
    generate(&Script::new(build(&factory)))
}

#[test]
fn label_with_dialogue_and_return() {
    let text = render(|f| {
        vec![f.label(
            "start",
            vec![],
            vec![f.dialogue("e", "Hello!"), f.ret(None)],
        )]
    });
    assert_eq!(text, "label start:\n    e \"Hello!\"\n    return\n");
}

#[test]
fn absent_fields_emit_nothing() {
    let text = render(|f| {
        vec![
            f.pause(None),
            f.scene(None, ImageExtras::default()),
            f.stop(AudioChannel::Sound, None),
            f.call("chapter", vec![], None),
        ]
    });
    assert_eq!(text, "pause\nscene\nstop sound\ncall chapter\n");
}

#[test]
fn empty_bodies_get_pass() {
    let text = render(|f| {
        vec![
            f.label("empty", vec![], vec![]),
            f.if_chain(vec![Branch::new(Some("x".into()), vec![])]),
            f.menu(vec![Choice::new("Ok", None, vec![])], MenuExtras::default()),
        ]
    });
    assert_eq!(
        text,
        "label empty:\n    pass\nif x:\n    pass\nmenu:\n    \"Ok\":\n        pass\n"
    );
}

#[test]
fn image_clauses_have_a_fixed_order() {
    let text = render(|f| {
        vec![f.show(
            "eileen",
            ImageExtras {
                attributes: vec!["happy".into()],
                transition: Some("dissolve".into()),
                behind: Some("bg".into()),
                as_tag: Some("e2".into()),
                zorder: Some(-1),
                layer: Some("front".into()),
                position: Some("right".into()),
            },
        )]
    });
    assert_eq!(
        text,
        "show eileen happy at right onlayer front zorder -1 as e2 behind bg with dissolve\n"
    );
}

#[test]
fn whole_numbers_keep_a_decimal_point() {
    let text = render(|f| {
        vec![
            f.play(
                AudioChannel::Voice,
                "line01.ogg",
                AudioOptions {
                    fade_in: Some(1.0),
                    ..AudioOptions::default()
                },
            ),
            f.pause(Some(2.0)),
        ]
    });
    assert_eq!(text, "play voice \"line01.ogg\" fadein 1.0\npause 2.0\n");
}

#[test]
fn raw_lines_are_reindented_at_depth() {
    let text = render(|f| {
        vec![f.label(
            "a",
            vec![],
            vec![f.raw("init python:\n    x = 1")],
        )]
    });
    assert_eq!(text, "label a:\n    init python:\n        x = 1\n");
}

#[test]
fn call_expression_uses_pass_for_arguments() {
    let text = render(|f| {
        vec![f.call_expression(
            "target_var",
            vec!["1".into()],
            Some("here".into()),
        )]
    });
    assert_eq!(text, "call expression target_var pass (1) from here\n");
}
