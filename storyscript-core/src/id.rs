//! Node identity and the Node Factory.
//!
//! Identifiers come from an [`IdGen`], an atomic counter. The parser and the
//! factory never touch a hidden global: they are handed a generator, and
//! [`IdGen::process`] is just the instance the convenience entry points pass.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::ast::{
    AssignOp, AudioChannel, AudioOptions, Branch, Choice, DialogueExtras, ImageExtras, MenuExtras,
    NvlAction, Prompt, Stmt, StmtKind,
};

/// Opaque synthetic node identifier. Only meaningful for editor bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic identifier source, safe to share between threads.
#[derive(Debug)]
pub struct IdGen {
    next: AtomicU64,
}

static PROCESS_IDS: IdGen = IdGen::new();

impl IdGen {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// The generator shared by [`crate::parse`] and [`NodeFactory::default`].
    pub fn process() -> &'static IdGen {
        &PROCESS_IDS
    }

    pub fn next_id(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Restarts numbering. Test harnesses only: ids handed out before the reset
    /// will be handed out again.
    #[cfg(any(test, feature = "test-util"))]
    pub fn reset(&self) {
        self.next.store(1, Ordering::Relaxed);
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds statements with fresh identifiers and normalized optional fields.
///
/// Normalization trims optional strings and turns blank ones into `None`,
/// drops blank entries from token lists, clears the speaker of an `extend`
/// line, folds `expression: Some(false)` into `None`, moves the dotted prefix
/// of a `define` name into its store and reads python code that is only
/// `pass` as empty. It never fills in a
/// value that was not given.
#[derive(Debug, Clone, Copy)]
pub struct NodeFactory<'g> {
    ids: &'g IdGen,
}

impl Default for NodeFactory<'static> {
    fn default() -> Self {
        Self::new(IdGen::process())
    }
}

impl<'g> NodeFactory<'g> {
    pub fn new(ids: &'g IdGen) -> Self {
        Self { ids }
    }

    /// Wraps an already built statement kind. Used by the parser, which also
    /// knows the source line.
    pub fn node(&self, kind: StmtKind, line: Option<usize>) -> Stmt {
        Stmt {
            id: self.ids.next_id(),
            line,
            kind: normalize(kind),
        }
    }

    fn make(&self, kind: StmtKind) -> Stmt {
        self.node(kind, None)
    }

    pub fn label(&self, name: impl Into<String>, params: Vec<String>, body: Vec<Stmt>) -> Stmt {
        self.make(StmtKind::Label {
            name: name.into(),
            params,
            body,
        })
    }

    pub fn dialogue(&self, speaker: &str, text: impl Into<String>) -> Stmt {
        self.dialogue_with(Some(speaker.to_string()), text, DialogueExtras::default())
    }

    pub fn narration(&self, text: impl Into<String>) -> Stmt {
        self.dialogue_with(None, text, DialogueExtras::default())
    }

    pub fn dialogue_with(
        &self,
        speaker: Option<String>,
        text: impl Into<String>,
        extras: DialogueExtras,
    ) -> Stmt {
        self.make(StmtKind::Dialogue {
            speaker,
            text: text.into(),
            extras,
        })
    }

    pub fn menu(&self, choices: Vec<Choice>, extras: MenuExtras) -> Stmt {
        self.make(StmtKind::Menu { choices, extras })
    }

    pub fn scene(&self, image: Option<String>, extras: ImageExtras) -> Stmt {
        self.make(StmtKind::Scene { image, extras })
    }

    pub fn show(&self, image: impl Into<String>, extras: ImageExtras) -> Stmt {
        self.make(StmtKind::Show {
            image: image.into(),
            extras,
        })
    }

    pub fn hide(&self, image: impl Into<String>, extras: ImageExtras) -> Stmt {
        self.make(StmtKind::Hide {
            image: image.into(),
            extras,
        })
    }

    pub fn with(&self, transition: impl Into<String>) -> Stmt {
        self.make(StmtKind::With {
            transition: transition.into(),
        })
    }

    pub fn jump(&self, target: impl Into<String>) -> Stmt {
        self.make(StmtKind::Jump {
            target: target.into(),
            expression: None,
        })
    }

    pub fn jump_expression(&self, expr: impl Into<String>) -> Stmt {
        self.make(StmtKind::Jump {
            target: expr.into(),
            expression: Some(true),
        })
    }

    pub fn call(&self, target: impl Into<String>, args: Vec<String>, from: Option<String>) -> Stmt {
        self.make(StmtKind::Call {
            target: target.into(),
            expression: None,
            args,
            from,
        })
    }

    pub fn call_expression(
        &self,
        expr: impl Into<String>,
        args: Vec<String>,
        from: Option<String>,
    ) -> Stmt {
        self.make(StmtKind::Call {
            target: expr.into(),
            expression: Some(true),
            args,
            from,
        })
    }

    pub fn ret(&self, value: Option<String>) -> Stmt {
        self.make(StmtKind::Return { value })
    }

    pub fn if_chain(&self, branches: Vec<Branch>) -> Stmt {
        self.make(StmtKind::If { branches })
    }

    pub fn set(&self, var: impl Into<String>, op: AssignOp, value: impl Into<String>) -> Stmt {
        self.make(StmtKind::Set {
            var: var.into(),
            op,
            value: value.into(),
        })
    }

    pub fn python(&self, code: impl Into<String>, early: bool, hide: bool) -> Stmt {
        self.make(StmtKind::Python {
            code: code.into(),
            early,
            hide,
        })
    }

    pub fn define(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
        store: Option<String>,
    ) -> Stmt {
        self.make(StmtKind::Define {
            name: name.into(),
            value: value.into(),
            store,
        })
    }

    pub fn default_var(&self, name: impl Into<String>, value: impl Into<String>) -> Stmt {
        self.make(StmtKind::Default {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn play(&self, channel: AudioChannel, file: impl Into<String>, options: AudioOptions) -> Stmt {
        self.make(StmtKind::Play {
            channel,
            file: file.into(),
            options,
        })
    }

    pub fn stop(&self, channel: AudioChannel, fade_out: Option<f64>) -> Stmt {
        self.make(StmtKind::Stop { channel, fade_out })
    }

    pub fn pause(&self, duration: Option<f64>) -> Stmt {
        self.make(StmtKind::Pause { duration })
    }

    pub fn nvl(&self, action: NvlAction) -> Stmt {
        self.make(StmtKind::Nvl { action })
    }

    pub fn raw(&self, content: impl Into<String>) -> Stmt {
        self.make(StmtKind::Raw {
            content: content.into(),
        })
    }
}

impl Choice {
    pub fn new(text: impl Into<String>, condition: Option<String>, body: Vec<Stmt>) -> Self {
        Self {
            text: text.into(),
            condition: opt(condition),
            body,
        }
    }
}

impl Branch {
    pub fn new(condition: Option<String>, body: Vec<Stmt>) -> Self {
        Self {
            condition: opt(condition),
            body,
        }
    }
}

fn opt(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn list(v: Vec<String>) -> Vec<String> {
    v.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn normalize_image(extras: ImageExtras) -> ImageExtras {
    ImageExtras {
        attributes: list(extras.attributes),
        position: opt(extras.position),
        layer: opt(extras.layer),
        zorder: extras.zorder,
        as_tag: opt(extras.as_tag),
        behind: opt(extras.behind),
        transition: opt(extras.transition),
    }
}

fn normalize(kind: StmtKind) -> StmtKind {
    match kind {
        StmtKind::Label { name, params, body } => StmtKind::Label {
            name,
            params: list(params),
            body,
        },
        StmtKind::Dialogue {
            speaker,
            text,
            extras,
        } => StmtKind::Dialogue {
            speaker: if extras.extend { None } else { opt(speaker) },
            text,
            extras: DialogueExtras {
                attributes: list(extras.attributes),
                transition: opt(extras.transition),
                extend: extras.extend,
            },
        },
        StmtKind::Menu { choices, extras } => StmtKind::Menu {
            choices: choices
                .into_iter()
                .map(|c| Choice {
                    condition: opt(c.condition),
                    ..c
                })
                .collect(),
            extras: MenuExtras {
                prompt: extras.prompt.map(|p| Prompt {
                    speaker: opt(p.speaker),
                    text: p.text,
                }),
                result_var: opt(extras.result_var),
                screen: opt(extras.screen),
            },
        },
        StmtKind::Scene { image, extras } => StmtKind::Scene {
            image: opt(image),
            extras: normalize_image(extras),
        },
        StmtKind::Show { image, extras } => StmtKind::Show {
            image,
            extras: normalize_image(extras),
        },
        StmtKind::Hide { image, extras } => StmtKind::Hide {
            image,
            extras: normalize_image(extras),
        },
        StmtKind::Jump { target, expression } => StmtKind::Jump {
            target,
            expression: expression.filter(|e| *e),
        },
        StmtKind::Call {
            target,
            expression,
            args,
            from,
        } => StmtKind::Call {
            target,
            expression: expression.filter(|e| *e),
            args: list(args),
            from: opt(from),
        },
        StmtKind::Return { value } => StmtKind::Return { value: opt(value) },
        StmtKind::If { branches } => StmtKind::If {
            branches: branches
                .into_iter()
                .map(|b| Branch {
                    condition: opt(b.condition),
                    body: b.body,
                })
                .collect(),
        },
        StmtKind::Define { name, value, store } => {
            let store = opt(store);
            match name.rsplit_once('.') {
                Some((prefix, last)) => StmtKind::Define {
                    name: last.to_string(),
                    value,
                    store: Some(match store {
                        Some(store) => format!("{store}.{prefix}"),
                        None => prefix.to_string(),
                    }),
                },
                None => StmtKind::Define { name, value, store },
            }
        }
        StmtKind::Python { code, early, hide } => StmtKind::Python {
            code: if code.trim() == "pass" { String::new() } else { code },
            early,
            hide,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_reset() {
        let ids = IdGen::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        ids.reset();
        assert_eq!(ids.next_id(), a);
    }

    #[test]
    fn factory_normalizes_blank_optionals() {
        let ids = IdGen::new();
        let f = NodeFactory::new(&ids);
        let stmt = f.show(
            "eileen",
            ImageExtras {
                position: Some("  ".into()),
                attributes: vec!["happy".into(), "".into()],
                ..ImageExtras::default()
            },
        );
        match stmt.kind {
            StmtKind::Show { extras, .. } => {
                assert_eq!(extras.position, None);
                assert_eq!(extras.attributes, vec!["happy".to_string()]);
            }
            other => panic!("expected show, got {:?}", other),
        }
        assert_eq!(stmt.line, None);
    }

    #[test]
    fn extend_drops_speaker() {
        let ids = IdGen::new();
        let f = NodeFactory::new(&ids);
        let stmt = f.dialogue_with(
            Some("e".into()),
            "more",
            DialogueExtras {
                extend: true,
                ..DialogueExtras::default()
            },
        );
        assert!(matches!(stmt.kind, StmtKind::Dialogue { speaker: None, .. }));
    }

    #[test]
    fn dotted_define_name_moves_into_store() {
        let ids = IdGen::new();
        let f = NodeFactory::new(&ids);
        let plain = f.define("a.b", "1", None);
        assert!(matches!(&plain.kind, StmtKind::Define { name, store: Some(s), .. } if name == "b" && s == "a"));
        let stored = f.define("c.d", "2", Some("config".into()));
        assert!(matches!(&stored.kind, StmtKind::Define { name, store: Some(s), .. } if name == "d" && s == "config.c"));
        assert!(matches!(f.python(" pass ", false, false).kind, StmtKind::Python { code, .. } if code.is_empty()));
    }
}
