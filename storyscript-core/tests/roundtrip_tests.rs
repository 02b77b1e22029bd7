use std::collections::HashSet;

use storyscript_core::ast::{
    AssignOp, AudioChannel, AudioOptions, Branch, Choice, DialogueExtras, ImageExtras, MenuExtras,
    NvlAction, Prompt, Script, Stmt, StmtKind,
};
use storyscript_core::{Generator, IdGen, NodeFactory, NodeId, generate, parse};

fn full_script(f: &NodeFactory) -> Script {
    Script::new(vec![
        f.define("theme", "\"theme.ogg\"", Some("audio".into())),
        f.define("e", "Character(\"Eileen\")", None),
        f.default_var("points", "0"),
        f.label(
            "start",
            vec![],
            vec![
                f.scene(
                    Some("bg".into()),
                    ImageExtras {
                        attributes: vec!["room".into()],
                        transition: Some("fade".into()),
                        ..ImageExtras::default()
                    },
                ),
                f.play(
                    AudioChannel::Music,
                    "theme.ogg",
                    AudioOptions {
                        fade_in: Some(1.5),
                        volume: Some(0.8),
                        r#loop: Some(true),
                        queue: false,
                    },
                ),
                f.show(
                    "eileen",
                    ImageExtras {
                        attributes: vec!["happy".into()],
                        position: Some("left".into()),
                        layer: Some("master".into()),
                        zorder: Some(3),
                        as_tag: Some("e1".into()),
                        behind: Some("desk".into()),
                        transition: Some("dissolve".into()),
                    },
                ),
                f.dialogue("e", "Hello, \"world\"!\nSecond line."),
                f.dialogue_with(
                    Some("e".into()),
                    "Wait",
                    DialogueExtras {
                        attributes: vec!["nointeract".into()],
                        transition: Some("vpunch".into()),
                        extend: false,
                    },
                ),
                f.dialogue_with(
                    None,
                    " and more.",
                    DialogueExtras {
                        extend: true,
                        ..DialogueExtras::default()
                    },
                ),
                f.narration("It was quiet."),
                f.with("dissolve"),
                f.set("points", AssignOp::Add, "1"),
                f.python("renpy.pause(0.5)", false, false),
                f.python("x = 1\nif x:\n    y = 2", true, true),
                f.if_chain(vec![
                    Branch::new(Some("points > 1".into()), vec![f.jump("good")]),
                    Branch::new(
                        Some("points == 1".into()),
                        vec![f.call(
                            "middle",
                            vec!["1".into(), "mode=\"x\"".into()],
                            Some("ret_site".into()),
                        )],
                    ),
                    Branch::new(None, vec![f.jump_expression("fallback_label")]),
                ]),
                f.menu(
                    vec![
                        Choice::new("Go left", None, vec![f.jump("left_path")]),
                        Choice::new("Go right", Some("brave".into()), vec![]),
                    ],
                    MenuExtras {
                        prompt: Some(Prompt {
                            speaker: Some("e".into()),
                            text: "Where?".into(),
                        }),
                        result_var: Some("seen".into()),
                        screen: Some("choice".into()),
                    },
                ),
                f.hide(
                    "eileen",
                    ImageExtras {
                        transition: Some("dissolve".into()),
                        ..ImageExtras::default()
                    },
                ),
                f.stop(AudioChannel::Music, Some(2.0)),
                f.play(
                    AudioChannel::Sound,
                    "click.ogg",
                    AudioOptions {
                        r#loop: Some(false),
                        queue: true,
                        ..AudioOptions::default()
                    },
                ),
                f.pause(Some(0.25)),
                f.pause(None),
                f.nvl(NvlAction::Clear),
                f.call_expression("target", vec!["2".into()], None),
                f.raw("init python:\n    config.debug = True"),
                f.ret(Some("points".into())),
            ],
        ),
        f.label(
            "good",
            vec!["reason".into(), "extra=None".into()],
            vec![f.ret(None)],
        ),
        f.label("left_path", vec![], vec![]),
        f.dialogue("nvl", "Hi"),
        f.dialogue("show", "Hi"),
        f.define("a.b", "1", None),
        f.define("c.d", "2", Some("config".into())),
        f.pause(Some(-1.0)),
        f.play(
            AudioChannel::Voice,
            "v.ogg",
            AudioOptions {
                volume: Some(-0.5),
                ..AudioOptions::default()
            },
        ),
        f.python("", false, false),
        f.python("pass", true, false),
        f.raw("scene_transition_custom extra weird syntax"),
    ])
}

#[test]
fn every_variant_survives_generate_then_parse() {
    let ids = IdGen::new();
    let script = full_script(&NodeFactory::new(&ids));
    let text = generate(&script);
    let reparsed = parse(&text, None);
    assert!(reparsed.errors.is_empty(), "{:#?}\n{}", reparsed.errors, text);
    assert!(reparsed.ast.equivalent(&script), "not equivalent:\n{}", text);
}

#[test]
fn generation_is_idempotent() {
    let ids = IdGen::new();
    let script = full_script(&NodeFactory::new(&ids));
    let once = generate(&script);
    let twice = generate(&parse(&once, None).ast);
    assert_eq!(once, twice);
}

#[test]
fn unknown_statement_regenerates_verbatim() {
    let src = "scene_transition_custom extra weird syntax\n";
    assert_eq!(generate(&parse(src, None).ast), src);
}

#[test]
fn handwritten_script_round_trips() {
    let src = r#"
# Opening chapter
define e = Character("Eileen")

label start:
    scene bg park with fade
    show eileen happy at center

    e "It's a nice day."  # greeting
    menu:
        "Agree":
            $ mood += 1
            e "Glad you think so."
        "Disagree" if mood < 0:
            jump argue
    if mood > 2:
        e "Let's go!"
    else:
        pass
	pause 1.0
    return

label argue:
    init python:
        import random
    return
"#;
    let first = parse(src, None);
    assert!(first.errors.is_empty(), "{:#?}", first.errors);
    let text = generate(&first.ast);
    let second = parse(&text, None);
    assert!(second.errors.is_empty(), "{:#?}", second.errors);
    assert!(second.ast.equivalent(&first.ast));
}

#[test]
fn nesting_indents_each_level_further() {
    let ids = IdGen::new();
    let f = NodeFactory::new(&ids);
    let script = Script::new(vec![f.label(
        "start",
        vec![],
        vec![f.if_chain(vec![Branch::new(
            Some("ready".into()),
            vec![f.menu(
                vec![Choice::new("Go", None, vec![f.dialogue("e", "Off we go.")])],
                MenuExtras::default(),
            )],
        )])],
    )]);
    let text = generate(&script);
    let indents: Vec<usize> = text
        .lines()
        .map(|l| l.len() - l.trim_start().len())
        .collect();
    assert_eq!(indents, vec![0, 4, 8, 12, 16]);
    assert!(indents.windows(2).all(|w| w[0] < w[1]));
    assert!(parse(&text, None).ast.equivalent(&script));
}

#[test]
fn custom_indent_width_round_trips() {
    let ids = IdGen::new();
    let script = full_script(&NodeFactory::new(&ids));
    let text = Generator::new(2).generate(&script);
    assert!(text.contains("\n  scene bg room with fade\n"));
    assert!(parse(&text, None).ast.equivalent(&script));
}

#[test]
fn equivalence_ignores_ids_and_detects_changes() {
    let a = full_script(&NodeFactory::new(&IdGen::new()));
    let b = full_script(&NodeFactory::new(&IdGen::new()));
    assert!(a.equivalent(&b));

    let mut c = b.clone();
    if let StmtKind::Label { body, .. } = &mut c.body[3].kind {
        body.pop();
    }
    assert!(!a.equivalent(&c));
}

fn collect_ids(stmts: &[Stmt], out: &mut Vec<NodeId>) {
    for stmt in stmts {
        out.push(stmt.id);
        match &stmt.kind {
            StmtKind::Label { body, .. } => collect_ids(body, out),
            StmtKind::If { branches } => {
                for b in branches {
                    collect_ids(&b.body, out);
                }
            }
            StmtKind::Menu { choices, .. } => {
                for c in choices {
                    collect_ids(&c.body, out);
                }
            }
            _ => {}
        }
    }
}

#[test]
fn ids_are_unique_across_threads() {
    let src = "label a:\n    e \"x\"\n    if y:\n        jump b\n    return\n";
    let ids: Vec<NodeId> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| parse(src, None))).collect();
        let mut ids = Vec::new();
        for h in handles {
            let result = h.join().expect("parser thread panicked");
            collect_ids(&result.ast.body, &mut ids);
        }
        ids
    });
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), 20);
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn parse_result_serializes_to_json() {
    let result = parse("label start:\n    e \"Hi\"\n    jump\n", Some("a.rpy"));
    let json = serde_json::to_string(&result).expect("serialize");
    let back: storyscript_core::ParseResult = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, result);
    assert_eq!(back.errors.len(), 1);
    assert_eq!(back.ast.meta.file.as_deref(), Some("a.rpy"));
}

#[test]
fn over_indented_line_stays_raw_through_regeneration() {
    let src = "label a:\n    e \"a\"\n        jump b\n";
    let first = parse(src, None);
    assert_eq!(first.errors.len(), 1);
    let text = generate(&first.ast);
    assert_eq!(text, src);
    let second = parse(&text, None);
    assert_eq!(second.errors, first.errors);
    assert!(second.ast.equivalent(&first.ast));
}
