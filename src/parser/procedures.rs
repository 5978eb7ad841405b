//! Performed-procedure table parser.
//!
//! Lines after `Procedimentos realizados:` drive a two-state machine:
//! a numbered line opens a line item, participant-shaped lines attach to the
//! open item, and a section-end label closes the table.

use crate::models::{PerformedProcedureLine, ProfessionalParticipation};
use crate::parser::shapes::{self, DIAGNOSIS_CODE, OCCUPATION_CODE, PROCEDURE_CODE};

pub const SECTION_START: &str = "Procedimentos realizados:";
pub const SECTION_END: [&str; 2] = ["Dados complementares", "Informações adicionais"];

#[derive(Debug)]
enum State {
    ExpectingLineItem,
    AccumulatingParticipants(PerformedProcedureLine),
}

#[derive(Debug)]
enum Input<'a> {
    Numbered { sequence: u32, rest: &'a str },
    Participant(ProfessionalParticipation),
    SectionEnd,
    Other,
}

fn classify(line: &str) -> Input<'_> {
    if SECTION_END.iter().any(|end| line.contains(end)) {
        return Input::SectionEnd;
    }
    if let Some((sequence, rest)) = shapes::numbered_line(line) {
        return Input::Numbered { sequence, rest };
    }
    if shapes::has_occupation_token(line) {
        if let Some(participant) = parse_participant(line) {
            return Input::Participant(participant);
        }
    }
    Input::Other
}

/// Parse every performed line in the table of a block.
pub fn parse_performed(lines: &[&str]) -> Vec<PerformedProcedureLine> {
    let Some(start) = lines.iter().position(|l| l.contains(SECTION_START)) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut state = State::ExpectingLineItem;

    for line in &lines[start + 1..] {
        state = match (state, classify(line)) {
            (state, Input::SectionEnd) => {
                flush(state, &mut items);
                return items;
            }
            (State::ExpectingLineItem, Input::Numbered { sequence, rest }) => {
                State::AccumulatingParticipants(open_item(sequence, rest))
            }
            (State::AccumulatingParticipants(current), Input::Numbered { sequence, rest }) => {
                flush(State::AccumulatingParticipants(current), &mut items);
                State::AccumulatingParticipants(open_item(sequence, rest))
            }
            (State::AccumulatingParticipants(mut current), Input::Participant(p)) => {
                current.participants.push(p);
                State::AccumulatingParticipants(current)
            }
            (State::ExpectingLineItem, Input::Participant(p)) => {
                tracing::debug!("participant {} outside a procedure line, ignored", p.document);
                State::ExpectingLineItem
            }
            (state, Input::Other) => state,
        };
    }

    flush(state, &mut items);
    items
}

fn open_item(sequence: u32, rest: &str) -> PerformedProcedureLine {
    let (procedure_code, description) = match PROCEDURE_CODE.find(rest) {
        Some(code) => {
            let after = rest[code.end()..].trim_start();
            let description = after.strip_prefix('-').unwrap_or(after).trim();
            (code.as_str().to_string(), description.to_string())
        }
        None => (String::new(), rest.trim().to_string()),
    };
    let diagnosis_codes = DIAGNOSIS_CODE
        .find_iter(&description)
        .map(|m| m.as_str().to_string())
        .collect();

    PerformedProcedureLine {
        sequence,
        procedure_code,
        description,
        diagnosis_codes,
        participants: Vec::new(),
    }
}

fn flush(state: State, items: &mut Vec<PerformedProcedureLine>) {
    if let State::AccumulatingParticipants(item) = state {
        if item.procedure_code.is_empty() {
            tracing::debug!("performed line {} has no procedure code, discarded", item.sequence);
        } else {
            items.push(item);
        }
    }
}

/// `<document> <CBO> <role words...> [<facility id>]`
fn parse_participant(line: &str) -> Option<ProfessionalParticipation> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let document = *tokens.first()?;
    let cbo_at = tokens
        .iter()
        .skip(1)
        .position(|t| OCCUPATION_CODE.is_match(t))?
        + 1;

    let mut role_tokens = &tokens[cbo_at + 1..];
    let mut facility_id = None;
    if let Some((last, init)) = role_tokens.split_last() {
        if shapes::is_facility_id(last) {
            facility_id = Some(last.to_string());
            role_tokens = init;
        }
    }

    Some(ProfessionalParticipation {
        document: document.to_string(),
        occupation_code: tokens[cbo_at].to_string(),
        role: role_tokens.join(" "),
        facility_id,
    })
}
