//! Recognition of `0 SYNTH BEGIN … 0 SYNTH END` blocks.
//!
//! [`LSynthScanner`] is fed the lines following an opening marker one at a
//! time and walks the states
//!
//! ```text
//! Ready --SHOW/HIDE--> Constraints --SYNTHESIZED BEGIN--> SynthesizedParts
//!                          |                                    |
//!                          +--------------END------------> Closed <--END
//! ```
//!
//! Any line that does not fit the current state fails the whole block with
//! a [`MalformedLSynthBlock`] carrying every line consumed so far, so the
//! caller can keep them verbatim and resume at the offending line.

use brickyard_core::{
    color::ColorCode,
    directive::Part,
    lsynth::ConstraintRole,
};

use crate::{
    line::{LineCommand, LineError, Meta, SynthMarker},
    span::Span,
};

/// A source line with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawLine<'a> {
    pub text: &'a str,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanState {
    /// After `0 SYNTH BEGIN`, waiting for `SHOW` or `HIDE`
    Ready,
    Constraints,
    SynthesizedParts,
    Closed,
}

/// Content of a well-formed block.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ScannedBlock {
    pub synth_type: String,
    pub color: ColorCode,
    pub hidden: bool,
    /// Constraints in file order; `None` when no `0 SYNTH CONSTRAINT` line
    /// preceded the part
    pub constraints: Vec<(Option<ConstraintRole>, Part)>,
    pub synthesized: Vec<Part>,
    pub opening: Span,
}

/// A block that broke off before `0 SYNTH END`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MalformedLSynthBlock<'a> {
    /// The opening marker and every line consumed after it
    pub consumed: Vec<RawLine<'a>>,
    /// What the scanner expected instead
    pub expected: &'static str,
    /// The offending line; `None` at end of input
    pub at: Option<Span>,
}

/// Outcome of feeding one line.
#[derive(Debug)]
pub(crate) enum Scan<'a> {
    Continue,
    Closed(ScannedBlock),
    /// The line was not consumed; re-process it after handling the block
    Malformed(MalformedLSynthBlock<'a>),
}

#[derive(Debug)]
pub(crate) struct LSynthScanner<'a> {
    state: ScanState,
    consumed: Vec<RawLine<'a>>,
    pending_role: Option<ConstraintRole>,
    synthesized_closed: bool,
    block: ScannedBlock,
}

impl<'a> LSynthScanner<'a> {
    /// Starts a block at its `0 SYNTH BEGIN` line.
    pub fn begin(opening: RawLine<'a>, synth_type: &str, color: ColorCode) -> Self {
        Self {
            state: ScanState::Ready,
            consumed: vec![opening],
            pending_role: None,
            synthesized_closed: false,
            block: ScannedBlock {
                synth_type: synth_type.to_string(),
                color,
                hidden: false,
                constraints: Vec::new(),
                synthesized: Vec::new(),
                opening: opening.span,
            },
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Feeds the next line with its classification.
    pub fn feed(&mut self, line: RawLine<'a>, command: &Result<LineCommand<'a>, LineError>) -> Scan<'a> {
        let next = match (self.state, command) {
            (ScanState::Ready, Ok(LineCommand::Meta(Meta::Synth(SynthMarker::Show)))) => {
                self.block.hidden = false;
                Some(ScanState::Constraints)
            }
            (ScanState::Ready, Ok(LineCommand::Meta(Meta::Synth(SynthMarker::Hide)))) => {
                self.block.hidden = true;
                Some(ScanState::Constraints)
            }

            (ScanState::Constraints, Ok(LineCommand::Meta(Meta::Synth(SynthMarker::Constraint(role)))))
                if self.pending_role.is_none() =>
            {
                self.pending_role = Some(*role);
                Some(ScanState::Constraints)
            }
            (ScanState::Constraints, Ok(LineCommand::Part { color, transform, name })) => {
                let part = Part::new(*name, *color, *transform);
                self.block.constraints.push((self.pending_role.take(), part));
                Some(ScanState::Constraints)
            }
            (ScanState::Constraints, Ok(LineCommand::Meta(Meta::Synth(SynthMarker::SynthesizedBegin))))
                if self.pending_role.is_none() =>
            {
                Some(ScanState::SynthesizedParts)
            }
            (ScanState::Constraints, Ok(LineCommand::Meta(Meta::Synth(SynthMarker::End))))
                if self.pending_role.is_none() =>
            {
                Some(ScanState::Closed)
            }

            (ScanState::SynthesizedParts, Ok(LineCommand::Part { color, transform, name }))
                if !self.synthesized_closed =>
            {
                self.block.synthesized.push(Part::new(*name, *color, *transform));
                Some(ScanState::SynthesizedParts)
            }
            (ScanState::SynthesizedParts, Ok(LineCommand::Meta(Meta::Synth(SynthMarker::SynthesizedEnd))))
                if !self.synthesized_closed =>
            {
                self.synthesized_closed = true;
                Some(ScanState::SynthesizedParts)
            }
            (ScanState::SynthesizedParts, Ok(LineCommand::Meta(Meta::Synth(SynthMarker::End)))) => {
                Some(ScanState::Closed)
            }

            _ => None,
        };

        match next {
            Some(ScanState::Closed) => {
                self.consumed.push(line);
                self.state = ScanState::Closed;
                Scan::Closed(std::mem::take(&mut self.block))
            }
            Some(state) => {
                self.consumed.push(line);
                self.state = state;
                Scan::Continue
            }
            None => Scan::Malformed(self.malformed(Some(line.span))),
        }
    }

    /// Ends the input inside the block.
    pub fn finish(mut self) -> MalformedLSynthBlock<'a> {
        self.malformed(None)
    }

    fn malformed(&mut self, at: Option<Span>) -> MalformedLSynthBlock<'a> {
        let expected = match self.state {
            ScanState::Ready => "`0 SYNTH SHOW` or `0 SYNTH HIDE`",
            ScanState::Constraints if self.pending_role.is_some() => "a constraint part line",
            ScanState::Constraints => {
                "a constraint, `0 SYNTH SYNTHESIZED BEGIN` or `0 SYNTH END`"
            }
            ScanState::SynthesizedParts if self.synthesized_closed => "`0 SYNTH END`",
            ScanState::SynthesizedParts => {
                "a synthesized part, `0 SYNTH SYNTHESIZED END` or `0 SYNTH END`"
            }
            ScanState::Closed => "nothing",
        };
        self.state = ScanState::Closed;
        MalformedLSynthBlock {
            consumed: std::mem::take(&mut self.consumed),
            expected,
            at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::classify;

    /// Feeds `lines` after an opening marker, returning the scanner and the
    /// outcome of the last line.
    fn scan<'a>(lines: &[&'a str]) -> (LSynthScanner<'a>, Vec<ScanState>, Option<Scan<'a>>) {
        let opening = RawLine {
            text: "0 SYNTH BEGIN rigid-hose 0",
            span: Span::new(0..26),
        };
        let mut scanner = LSynthScanner::begin(opening, "rigid-hose", ColorCode::Indexed(0));
        let mut states = vec![scanner.state()];
        let mut offset = 27;
        let mut last = None;
        for &text in lines {
            let line = RawLine {
                text,
                span: Span::new(offset..offset + text.len()),
            };
            offset += text.len() + 1;
            let outcome = scanner.feed(line, &classify(text));
            states.push(scanner.state());
            let stop = !matches!(outcome, Scan::Continue);
            last = Some(outcome);
            if stop {
                break;
            }
        }
        (scanner, states, last)
    }

    #[test]
    fn test_full_state_walk() {
        let (_, states, last) = scan(&[
            "0 SYNTH SHOW",
            "0 SYNTH CONSTRAINT START",
            "1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS00.dat",
            "0 SYNTH CONSTRAINT END",
            "1 16 20 0 0 1 0 0 0 1 0 0 0 1 LS00.dat",
            "0 SYNTH SYNTHESIZED BEGIN",
            "1 0 0 0 0 1 0 0 0 1 0 0 0 1 LS71.dat",
            "1 0 10 0 0 1 0 0 0 1 0 0 0 1 LS71.dat",
            "0 SYNTH SYNTHESIZED END",
            "0 SYNTH END",
        ]);

        assert_eq!(
            states,
            vec![
                ScanState::Ready,
                ScanState::Constraints,
                ScanState::Constraints,
                ScanState::Constraints,
                ScanState::Constraints,
                ScanState::Constraints,
                ScanState::SynthesizedParts,
                ScanState::SynthesizedParts,
                ScanState::SynthesizedParts,
                ScanState::SynthesizedParts,
                ScanState::Closed,
            ]
        );
        let Some(Scan::Closed(block)) = last else {
            panic!("expected a closed block");
        };
        assert_eq!(block.synth_type, "rigid-hose");
        assert!(!block.hidden);
        assert_eq!(
            block
                .constraints
                .iter()
                .map(|(role, _)| *role)
                .collect::<Vec<_>>(),
            vec![Some(ConstraintRole::Start), Some(ConstraintRole::End)]
        );
        assert_eq!(block.synthesized.len(), 2);
    }

    #[test]
    fn test_end_straight_from_constraints() {
        let (_, _, last) = scan(&[
            "0 SYNTH HIDE",
            "1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS00.dat",
            "0 SYNTH END",
        ]);
        let Some(Scan::Closed(block)) = last else {
            panic!("expected a closed block");
        };
        assert!(block.hidden);
        assert_eq!(block.constraints, vec![(
            None,
            Part::new(
                "LS00.dat",
                ColorCode::Current,
                brickyard_core::geometry::Transform::identity()
            )
        )]);
        assert!(block.synthesized.is_empty());
    }

    #[test]
    fn test_out_of_order_marker_is_malformed() {
        let (_, _, last) = scan(&[
            "0 SYNTH SHOW",
            "1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS00.dat",
            "0 SYNTH SYNTHESIZED END",
        ]);
        let Some(Scan::Malformed(malformed)) = last else {
            panic!("expected a malformed block");
        };
        let texts: Vec<&str> = malformed.consumed.iter().map(|line| line.text).collect();
        assert_eq!(
            texts,
            vec![
                "0 SYNTH BEGIN rigid-hose 0",
                "0 SYNTH SHOW",
                "1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS00.dat",
            ]
        );
        assert!(malformed.at.is_some());
    }

    #[test]
    fn test_missing_show_is_malformed() {
        let (_, _, last) = scan(&["1 16 0 0 0 1 0 0 0 1 0 0 0 1 LS00.dat"]);
        let Some(Scan::Malformed(malformed)) = last else {
            panic!("expected a malformed block");
        };
        assert_eq!(malformed.consumed.len(), 1);
        assert_eq!(malformed.expected, "`0 SYNTH SHOW` or `0 SYNTH HIDE`");
    }

    #[test]
    fn test_structural_meta_breaks_block() {
        let (_, _, last) = scan(&["0 SYNTH SHOW", "0 STEP"]);
        assert!(matches!(last, Some(Scan::Malformed(_))));

        let (_, _, last) = scan(&["0 SYNTH SHOW", "0 SYNTH BEGIN chain 0"]);
        assert!(matches!(last, Some(Scan::Malformed(_))));
    }

    #[test]
    fn test_dangling_constraint_marker() {
        let (_, _, last) = scan(&["0 SYNTH SHOW", "0 SYNTH CONSTRAINT MID", "0 SYNTH END"]);
        let Some(Scan::Malformed(malformed)) = last else {
            panic!("expected a malformed block");
        };
        assert_eq!(malformed.expected, "a constraint part line");
    }

    #[test]
    fn test_end_of_input_inside_block() {
        let (scanner, _, last) = scan(&["0 SYNTH SHOW", "0 SYNTH SYNTHESIZED BEGIN"]);
        assert!(matches!(last, Some(Scan::Continue)));

        let malformed = scanner.finish();
        assert_eq!(malformed.consumed.len(), 3);
        assert_eq!(malformed.at, None);
    }
}
