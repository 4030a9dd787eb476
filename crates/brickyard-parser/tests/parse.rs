use brickyard_core::{
    color::{ColorCode, Colorable},
    directive::DirectiveKind,
    lsynth::{ConstraintRole, SynthClass},
    tree::{DirectiveId, DirectiveTree},
};
use brickyard_parser::{
    ParseConfig, Parsed,
    error::{ErrorCode, Severity},
    parse,
};

fn read(source: &str) -> Parsed {
    parse(source, &ParseConfig::default())
}

fn codes(parsed: &Parsed) -> Vec<ErrorCode> {
    parsed.diagnostics.iter().filter_map(|d| d.code()).collect()
}

fn only_model(tree: &DirectiveTree) -> DirectiveId {
    assert_eq!(tree.models().len(), 1, "expected a single model");
    tree.models()[0]
}

fn steps(tree: &DirectiveTree) -> Vec<DirectiveId> {
    tree.children(only_model(tree))
        .expect("model is in the tree")
        .to_vec()
}

fn first_block(tree: &DirectiveTree) -> DirectiveId {
    *tree.blocks().first().expect("document has an LSynth block")
}

const HOSE: &str = "\
0 SYNTH BEGIN rigid-hose 16\n\
0 SYNTH SHOW\n\
0 SYNTH CONSTRAINT START\n\
1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
0 SYNTH CONSTRAINT END\n\
1 16 0 -40 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
0 SYNTH SYNTHESIZED BEGIN\n\
1 16 0 -10 0 1 0 0 0 1 0 0 0 1 LS71.dat\n\
1 16 0 -20 0 1 0 0 0 1 0 0 0 1 LS71.dat\n\
0 SYNTH SYNTHESIZED END\n\
0 SYNTH END\n";

#[test]
fn test_single_model_with_header_and_steps() {
    let source = "\
0 Bracket assembly\n\
0 Name: bracket.ldr\n\
0 Author: Jane Doe\n\
1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n\
0 STEP\n\
1 1 10 -24 0 1 0 0 0 1 0 0 0 1 3003.dat\n";

    let parsed = read(source);
    assert!(parsed.diagnostics.is_empty());
    assert!(!parsed.tree.is_mpd());

    let model = parsed.tree.model(only_model(&parsed.tree)).unwrap();
    assert_eq!(model.description(), Some("Bracket assembly"));
    assert_eq!(model.name(), Some("bracket.ldr"));
    assert_eq!(model.author(), Some("Jane Doe"));

    let steps = steps(&parsed.tree);
    assert_eq!(steps.len(), 2);
    let first = parsed.tree.children(steps[0]).unwrap();
    assert_eq!(first.len(), 1);
    let part = parsed.tree.part(first[0]).unwrap();
    assert_eq!(part.display_name(), "3001.dat");
    assert_eq!(part.color(), ColorCode::from_code(4));
}

#[test]
fn test_unknown_meta_commands_are_comments() {
    let source = "\
1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n\
0 !LDRAW_ORG Unofficial_Model\n\
0 // roof starts here\n";

    let parsed = read(source);
    assert!(parsed.diagnostics.is_empty());

    let step = steps(&parsed.tree)[0];
    let children = parsed.tree.children(step).unwrap();
    assert_eq!(children.len(), 3);
    match parsed.tree.kind(children[1]).unwrap() {
        DirectiveKind::Comment(comment) => assert_eq!(comment.text(), "!LDRAW_ORG Unofficial_Model"),
        other => panic!("expected a comment, found {}", other.name()),
    }
}

#[test]
fn test_mpd_models_are_found_by_name() {
    let source = "\
0 FILE main.ldr\n\
0 Main model\n\
1 16 0 0 0 1 0 0 0 1 0 0 0 1 wheel.ldr\n\
0 NOFILE\n\
\n\
0 FILE wheel.ldr\n\
1 0 0 0 0 1 0 0 0 1 0 0 0 1 3641.dat\n\
0 NOFILE\n";

    let parsed = read(source);
    assert!(parsed.diagnostics.is_empty());
    assert!(parsed.tree.is_mpd());
    assert_eq!(parsed.tree.models().len(), 2);

    let main = parsed.tree.models()[0];
    assert_eq!(parsed.tree.model(main).unwrap().description(), Some("Main model"));
    let wheel = parsed.tree.find_model("wheel.ldr").expect("submodel exists");
    assert_eq!(parsed.tree.models()[1], wheel);
}

#[test]
fn test_blank_lines_before_first_file_open_no_model() {
    let source = "\n\n0 FILE main.ldr\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n0 NOFILE\n";

    let parsed = read(source);
    let main = only_model(&parsed.tree);
    assert_eq!(parsed.tree.model(main).unwrap().file_name(), Some("main.ldr"));
    assert_eq!(
        parsed.tree.to_ldraw_string(),
        "0 FILE main.ldr\r\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n0 NOFILE\r\n"
    );
}

#[test]
fn test_leading_blank_lines_of_plain_file_are_kept() {
    let source = "\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n";

    let parsed = read(source);
    only_model(&parsed.tree);
    assert_eq!(parsed.tree.write(), source.lines().collect::<Vec<_>>());
}

#[test]
fn test_lsynth_block_is_recognized() {
    let parsed = read(HOSE);
    assert!(parsed.diagnostics.is_empty());

    let block_id = first_block(&parsed.tree);
    let block = parsed.tree.block(block_id).unwrap();
    assert_eq!(block.synth_type(), "rigid-hose");
    assert_eq!(block.class(), Some(SynthClass::Hose));
    assert!(!block.is_hidden());
    assert!(!block.is_stale());

    let constraints = parsed.tree.children(block_id).unwrap();
    let roles: Vec<_> = constraints
        .iter()
        .map(|id| parsed.tree.part(*id).unwrap().constraint_role())
        .collect();
    assert_eq!(roles, vec![Some(ConstraintRole::Start), Some(ConstraintRole::End)]);

    let synthesized = parsed.tree.synthesized(block_id).unwrap();
    assert_eq!(synthesized.len(), 2);
    assert!(synthesized.iter().all(|id| parsed.tree.is_synthesized(*id)));
}

#[test]
fn test_constraints_without_roles_get_positional_roles() {
    let source = "\
0 SYNTH BEGIN flexible-hose 16\n\
0 SYNTH HIDE\n\
1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
1 16 0 -20 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
1 16 0 -40 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
0 SYNTH END\n";

    let parsed = read(source);
    assert!(parsed.diagnostics.is_empty());

    let block_id = first_block(&parsed.tree);
    let block = parsed.tree.block(block_id).unwrap();
    assert!(block.is_hidden());
    assert!(block.is_stale(), "a block without synthesized parts needs synthesis");

    let roles: Vec<_> = parsed
        .tree
        .children(block_id)
        .unwrap()
        .iter()
        .map(|id| parsed.tree.part(*id).unwrap().constraint_role())
        .collect();
    assert_eq!(
        roles,
        vec![
            Some(ConstraintRole::Start),
            Some(ConstraintRole::Mid),
            Some(ConstraintRole::End)
        ]
    );
}

#[test]
fn test_unknown_synthesis_type_is_kept_with_warning() {
    let source = "\
0 SYNTH BEGIN garden-hose 2\n\
0 SYNTH SHOW\n\
1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
0 SYNTH END\n";

    let parsed = read(source);
    assert_eq!(codes(&parsed), vec![ErrorCode::E300]);
    assert_eq!(parsed.diagnostics[0].severity(), Severity::Warning);

    let block = parsed.tree.block(first_block(&parsed.tree)).unwrap();
    assert_eq!(block.class(), None);
    assert!(!block.is_stale());
}

#[test]
fn test_malformed_block_is_kept_verbatim() {
    let source = "\
0 SYNTH BEGIN rigid-hose 16\n\
0 SYNTH SHOW\n\
1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
0 STEP\n\
1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n";

    let parsed = read(source);
    assert_eq!(codes(&parsed), vec![ErrorCode::E200]);
    assert!(parsed.has_errors());

    let diagnostic = &parsed.diagnostics[0];
    let step_line = source.find("0 STEP").unwrap();
    assert_eq!(diagnostic.primary_span().map(|span| span.start()), Some(step_line));

    assert!(parsed.tree.blocks().is_empty());
    let steps = steps(&parsed.tree);
    assert_eq!(steps.len(), 2, "the offending STEP is still honoured");

    let kept = parsed.tree.children(steps[0]).unwrap();
    assert_eq!(kept.len(), 3);
    for id in kept {
        assert!(matches!(parsed.tree.kind(*id).unwrap(), DirectiveKind::Opaque(_)));
    }

    let written = parsed.tree.write();
    assert_eq!(written[..3], source.lines().take(3).collect::<Vec<_>>()[..]);
}

#[test]
fn test_nested_block_is_kept_verbatim_to_outer_end() {
    let source = "\
0 SYNTH BEGIN rigid-hose 16\n\
0 SYNTH SHOW\n\
0 SYNTH BEGIN rigid-hose 16\n\
0 SYNTH SHOW\n\
1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
1 16 20 0 0 1 0 0 0 1 0 0 0 1 LS01.dat\n\
0 SYNTH END\n\
0 SYNTH END\n\
1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n";

    let parsed = read(source);
    assert_eq!(codes(&parsed), vec![ErrorCode::E200]);
    assert!(parsed.tree.blocks().is_empty());

    let kept = parsed.tree.children(steps(&parsed.tree)[0]).unwrap();
    assert_eq!(kept.len(), 9);
    for id in &kept[..8] {
        assert!(matches!(parsed.tree.kind(*id).unwrap(), DirectiveKind::Opaque(_)));
    }
    assert!(matches!(parsed.tree.kind(kept[8]).unwrap(), DirectiveKind::Part(_)));
    assert_eq!(parsed.tree.write(), source.lines().collect::<Vec<_>>());
}

#[test]
fn test_nested_block_without_outer_end() {
    let source = "\
0 SYNTH BEGIN rigid-hose 16\n\
0 SYNTH SHOW\n\
0 SYNTH BEGIN chain 0\n\
0 SYNTH SHOW\n\
0 SYNTH END\n\
1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n";

    let parsed = read(source);
    assert_eq!(codes(&parsed), vec![ErrorCode::E200, ErrorCode::E201]);
    assert!(parsed.tree.blocks().is_empty());
    assert_eq!(parsed.tree.write(), source.lines().collect::<Vec<_>>());
}

#[test]
fn test_unterminated_block_reports_end_of_input() {
    let source = "\
0 SYNTH BEGIN rigid-hose 16\n\
0 SYNTH SHOW\n\
0 SYNTH SYNTHESIZED BEGIN\n";

    let parsed = read(source);
    assert_eq!(codes(&parsed), vec![ErrorCode::E201]);
    assert!(parsed.tree.blocks().is_empty());
    assert_eq!(parsed.tree.write(), source.lines().collect::<Vec<_>>());
}

#[test]
fn test_stray_synth_marker_is_kept() {
    let source = "1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n0 SYNTH END\n";

    let parsed = read(source);
    assert_eq!(codes(&parsed), vec![ErrorCode::E202]);
    assert!(!parsed.has_errors());
    assert_eq!(parsed.tree.write(), source.lines().collect::<Vec<_>>());
}

#[test]
fn test_unreadable_lines_are_kept_with_warnings() {
    let source = "\
1 4 0 0 0 1 0 0 0 1 0 0 0 1\n\
2 24 a 0 0 1 1 1\n\
3 red 0 0 0 1 0 0 0 1 0\n\
9 what is this\n";

    let parsed = read(source);
    assert_eq!(
        codes(&parsed),
        vec![ErrorCode::E100, ErrorCode::E101, ErrorCode::E102, ErrorCode::E100]
    );
    assert!(parsed
        .diagnostics
        .iter()
        .all(|diagnostic| diagnostic.severity() == Severity::Warning));
    assert_eq!(parsed.tree.write(), source.lines().collect::<Vec<_>>());
}

#[test]
fn test_line_endings_do_not_matter() {
    let lf = format!("0 Hose test\n{HOSE}");
    let crlf = lf.replace('\n', "\r\n");

    let from_lf = read(&lf).tree.to_ldraw_string();
    let from_crlf = read(&crlf).tree.to_ldraw_string();
    assert_eq!(from_lf, from_crlf);
}

#[test]
fn test_canonical_document_is_written_back_unchanged() {
    let source = [
        "0 FILE crane.ldr",
        "0 Crane",
        "0 Name: crane.ldr",
        "0 Author: Jane Doe",
        "1 71 0 -24 0 1 0 0 0 1 0 0 0 1 3001.dat",
        "2 24 0 0 0 20 0 0",
        "0 ROTSTEP 0 90 0 ABS",
        "0 SYNTH BEGIN rigid-hose 16",
        "0 SYNTH HIDE",
        "0 SYNTH CONSTRAINT START",
        "1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS01.dat",
        "0 SYNTH CONSTRAINT END",
        "1 16 0 -40 0 1 0 0 0 1 0 0 0 1 LS01.dat",
        "0 SYNTH SYNTHESIZED BEGIN",
        "1 16 0 -10 0 1 0 0 0 1 0 0 0 1 LS71.dat",
        "0 SYNTH SYNTHESIZED END",
        "0 SYNTH END",
        "0 !LEOCAD CAMERA",
        "0 STEP",
        "1 0x2FF8000 0.5 0 -1.25 0 0 1 0 1 0 -1 0 0 sub.ldr",
        "0 NOFILE",
        "0 FILE sub.ldr",
        "3 4 0 0 0 10 0 0 0 0 10",
        "0 NOFILE",
    ]
    .join("\r\n")
        + "\r\n";

    let parsed = read(&source);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    assert_eq!(parsed.tree.to_ldraw_string(), source);
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;

    fn coordinate() -> impl Strategy<Value = String> {
        (-200i32..200, prop::bool::ANY).prop_map(|(value, half)| {
            if half {
                format!("{value}.5")
            } else {
                value.to_string()
            }
        })
    }

    fn part_line(name: &'static str) -> impl Strategy<Value = String> {
        (0u32..72, prop::collection::vec(coordinate(), 3)).prop_map(move |(color, position)| {
            format!(
                "1 {color} {} {} {} 1 0 0 0 1 0 0 0 1 {name}",
                position[0], position[1], position[2]
            )
        })
    }

    fn comment_line() -> impl Strategy<Value = String> {
        "[a-z]{1,8}( [a-z]{1,8}){0,3}".prop_map(|text| format!("0 {text}"))
    }

    fn lsynth_block() -> impl Strategy<Value = Vec<String>> {
        (
            prop::sample::select(vec!["rigid-hose", "rubber-band", "mystery"]),
            prop::bool::ANY,
            prop::collection::vec((prop::bool::ANY, part_line("LS01.dat")), 0..4),
            prop::collection::vec(part_line("LS71.dat"), 0..3),
        )
            .prop_map(|(synth_type, hidden, constraints, synthesized)| {
                let mut lines = vec![
                    format!("0 SYNTH BEGIN {synth_type} 16"),
                    if hidden { "0 SYNTH HIDE" } else { "0 SYNTH SHOW" }.to_string(),
                ];
                for (with_role, part) in constraints {
                    if with_role {
                        lines.push("0 SYNTH CONSTRAINT MID".to_string());
                    }
                    lines.push(part);
                }
                lines.push("0 SYNTH SYNTHESIZED BEGIN".to_string());
                lines.extend(synthesized);
                lines.push("0 SYNTH SYNTHESIZED END".to_string());
                lines.push("0 SYNTH END".to_string());
                lines
            })
    }

    /// Mostly well-formed lines with the occasional broken one.
    fn chunk() -> impl Strategy<Value = Vec<String>> {
        prop_oneof![
            4 => part_line("3001.dat").prop_map(|line| vec![line]),
            2 => comment_line().prop_map(|line| vec![line]),
            2 => Just(vec!["0 STEP".to_string()]),
            1 => Just(vec!["0 ROTSTEP 0 45 0".to_string()]),
            1 => Just(vec!["0 Name: thing.ldr".to_string()]),
            1 => Just(vec![String::new()]),
            1 => Just(vec!["2 24 0 0 0 0 -24 0".to_string()]),
            1 => Just(vec!["7 not a line".to_string()]),
            1 => Just(vec!["0 SYNTH SHOW".to_string()]),
            1 => Just(vec!["0 SYNTH BEGIN rigid-hose 16".to_string()]),
            2 => lsynth_block(),
        ]
    }

    fn document() -> impl Strategy<Value = String> {
        (prop::bool::ANY, prop::collection::vec(chunk(), 0..24)).prop_map(|(mpd, chunks)| {
            let mut lines: Vec<String> = chunks.into_iter().flatten().collect();
            if mpd {
                lines.insert(0, "0 FILE main.ldr".to_string());
                lines.push("0 NOFILE".to_string());
            }
            lines.join("\n")
        })
    }

    fn check_written_text_is_stable(source: &str) -> Result<(), TestCaseError> {
        let once = read(source).tree.to_ldraw_string();
        let twice = read(&once).tree.to_ldraw_string();
        prop_assert_eq!(once, twice);
        Ok(())
    }

    fn check_unreadable_lines_survive(source: &str) -> Result<(), TestCaseError> {
        let written = read(source).tree.write();
        for line in source.lines().filter(|line| line.starts_with('7')) {
            prop_assert!(written.iter().any(|out| out == line), "lost `{}`", line);
        }
        Ok(())
    }

    fn check_block_count_is_stable(source: &str) -> Result<(), TestCaseError> {
        let first = read(source);
        let second = read(&first.tree.to_ldraw_string());
        prop_assert_eq!(first.tree.blocks().len(), second.tree.blocks().len());
        Ok(())
    }

    proptest! {
        #[test]
        fn test_written_text_is_stable(source in document()) {
            check_written_text_is_stable(&source)?;
        }

        #[test]
        fn test_unreadable_lines_survive(source in document()) {
            check_unreadable_lines_survive(&source)?;
        }

        #[test]
        fn test_block_count_is_stable(source in document()) {
            check_block_count_is_stable(&source)?;
        }
    }
}
