//! Dialogflow fulfillment webhook.
//!
//! Translates a Dialogflow v2 webhook request (`queryResult.action` +
//! `queryResult.parameters`) into roster operations and formats a
//! natural-language reply. Unknown actions and domain failures (unknown
//! user, duplicate) answer with the apology fallback at HTTP 200, since
//! the chatbot renders the text and not the status code. Malformed
//! payloads and missing parameters are a 400; storage failures propagate
//! as usual.

use crate::error::{Result, RotaError};
use crate::period::Window;
use crate::roster::{DelayTarget, Roster};
use crate::schedule::Schedule;
use crate::store::{self, BlobStore};
use chrono::{DateTime, NaiveDate};
use serde_json::{Value, json};

const FALLBACK_TEXT: &str = "Sorry, that failed. Can you try again?";

/// Handle one webhook request against the store.
pub async fn handle(
    store: &dyn BlobStore,
    schedule: &Schedule,
    today: NaiveDate,
    payload: &Value,
) -> Result<Value> {
    let Some(action) = payload
        .pointer("/queryResult/action")
        .and_then(Value::as_str)
    else {
        return Err(RotaError::InvalidInput(
            "payload is missing queryResult.action".to_owned(),
        ));
    };
    let parameters = payload
        .pointer("/queryResult/parameters")
        .cloned()
        .unwrap_or_else(|| json!({}));

    let (mut roster, version) = store::load_roster(store).await?;

    let reply = match apply_action(action, &parameters, &mut roster, schedule, today) {
        Ok(ActionOutcome { reply, mutated }) => {
            if mutated {
                store::save_roster(store, &roster, &version).await?;
            }
            reply
        }
        // Domain errors become the spoken fallback, not an HTTP error.
        // Missing or malformed parameters stay a 400.
        Err(RotaError::UnknownUser(_) | RotaError::DuplicateUser(_)) => fallback(),
        Err(e) => return Err(e),
    };

    Ok(reply)
}

#[derive(Debug)]
struct ActionOutcome {
    reply: Value,
    mutated: bool,
}

fn replied(reply: Value) -> Result<ActionOutcome> {
    Ok(ActionOutcome {
        reply,
        mutated: false,
    })
}

fn mutated(reply: Value) -> Result<ActionOutcome> {
    Ok(ActionOutcome {
        reply,
        mutated: true,
    })
}

fn fallback() -> Value {
    json!({ "fulfillment_text": FALLBACK_TEXT })
}

fn text_reply(text: String) -> Value {
    json!({ "fulfillment_text": text })
}

/// One `user:\tdate` line per entry, as Dialogflow fulfillment messages.
fn message_list(entries: &[crate::roster::Entry]) -> Value {
    let messages: Vec<Value> = entries
        .iter()
        .map(|e| json!({ "text": { "text": [format!("{}:\t{}", e.user, e.date)] } }))
        .collect();
    json!({ "fulfillmentMessages": messages })
}

fn days_phrase(days: u32) -> String {
    if days == 1 {
        "1 day".to_owned()
    } else {
        format!("{days} days")
    }
}

/// `parameters.<key>.name`, as sent for Dialogflow `@sys.person` entities.
fn person_name<'a>(parameters: &'a Value, key: &str) -> Result<&'a str> {
    parameters
        .get(key)
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| RotaError::InvalidInput(format!("missing parameter {key}")))
}

/// `parameters.duration` as whole days.
fn duration_days(parameters: &Value) -> Result<u32> {
    let raw = parameters
        .get("duration")
        .ok_or_else(|| RotaError::InvalidInput("missing parameter duration".to_owned()))?;
    // Either a bare number or a `@sys.duration` struct with an amount.
    let amount = raw.as_f64().or_else(|| {
        raw.get("amount").and_then(Value::as_f64)
    });
    match amount {
        Some(days) if days >= 1.0 && days <= f64::from(u32::MAX) => Ok(days as u32),
        _ => Err(RotaError::InvalidInput(format!(
            "invalid duration: {raw}"
        ))),
    }
}

/// A date from a `@sys.date-period` boundary (full datetime or bare date).
fn period_date(period: &Value, key: &str) -> Result<NaiveDate> {
    let raw = period.get(key).and_then(Value::as_str).ok_or_else(|| {
        RotaError::InvalidInput(format!("missing date-period field {key}"))
    })?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    raw.parse::<NaiveDate>()
        .map_err(|_| RotaError::InvalidInput(format!("invalid date-period field {key}: {raw:?}")))
}

fn apply_action(
    action: &str,
    parameters: &Value,
    roster: &mut Roster,
    schedule: &Schedule,
    today: NaiveDate,
) -> Result<ActionOutcome> {
    match action {
        "next" => {
            let found = roster.lookup(Window::FirstOnOrAfter(today));
            match found.first() {
                Some(entry) => replied(text_reply(format!(
                    "The next person is {} ({})",
                    entry.user, entry.date
                ))),
                None => replied(fallback()),
            }
        }
        "get-assignments-for-period" => {
            let period = parameters.get("date-period").ok_or_else(|| {
                RotaError::InvalidInput("missing parameter date-period".to_owned())
            })?;
            let from = period_date(period, "startDate")?;
            let to = period_date(period, "endDate")?;
            let found = roster.lookup(Window::Range { from, to });
            replied(message_list(&found))
        }
        "add" => {
            let name = person_name(parameters, "person")?;
            let entry = roster.add(name, today, schedule)?;
            mutated(text_reply(format!(
                "I added {}. He/she is scheduled for {}.",
                entry.user, entry.date
            )))
        }
        "show-all" => {
            if roster.is_empty() {
                replied(text_reply("There are no users added yet.".to_owned()))
            } else {
                replied(message_list(roster.entries()))
            }
        }
        "lookup-user" => {
            let name = person_name(parameters, "person")?;
            let entry = roster.get(name)?;
            replied(text_reply(format!(
                "{} is scheduled for {}.",
                entry.user, entry.date
            )))
        }
        "remove" => {
            let name = person_name(parameters, "person")?;
            let removed = roster.remove(name, schedule)?;
            mutated(text_reply(format!(
                "Ok, I removed {} from the list.",
                removed.user
            )))
        }
        "swap" => {
            let a = person_name(parameters, "person")?.to_owned();
            let b = person_name(parameters, "other_person")?.to_owned();
            roster.swap(&a, &b)?;
            mutated(text_reply(format!("Ok, I swapped {a} and {b}.")))
        }
        "delay-next" => {
            let days = duration_days(parameters)?;
            roster.delay(DelayTarget::Upcoming(today), days)?;
            mutated(text_reply(format!(
                "Ok, I delayed the next assignment with {}.",
                days_phrase(days)
            )))
        }
        "delay-all" => {
            let days = duration_days(parameters)?;
            roster.delay(DelayTarget::All, days)?;
            mutated(text_reply(format!(
                "Ok, I delayed all assignments with {}.",
                days_phrase(days)
            )))
        }
        _ => replied(fallback()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule() -> Schedule {
        Schedule {
            allow_start_today: true,
            ..Schedule::default()
        }
    }

    fn abc() -> Roster {
        let mut roster = Roster::new();
        for user in ["a", "b", "c"] {
            roster.add(user, date(2024, 1, 1), &schedule()).unwrap();
        }
        roster
    }

    fn run(action: &str, parameters: Value, roster: &mut Roster) -> Result<ActionOutcome> {
        apply_action(action, &parameters, roster, &schedule(), date(2024, 1, 5))
    }

    #[test]
    fn next_names_the_upcoming_user() {
        let mut roster = abc();
        let outcome = run("next", json!({}), &mut roster).unwrap();
        assert!(!outcome.mutated);
        assert_eq!(
            outcome.reply["fulfillment_text"],
            "The next person is b (2024-01-08)"
        );
    }

    #[test]
    fn next_on_empty_roster_falls_back() {
        let mut roster = Roster::new();
        let outcome = run("next", json!({}), &mut roster).unwrap();
        assert_eq!(outcome.reply["fulfillment_text"], FALLBACK_TEXT);
    }

    #[test]
    fn period_lookup_lists_matching_entries() {
        let mut roster = abc();
        let params = json!({
            "date-period": {
                "startDate": "2024-01-01T12:00:00+01:00",
                "endDate": "2024-01-08T12:00:00+01:00"
            }
        });
        let outcome = run("get-assignments-for-period", params, &mut roster).unwrap();
        let messages = outcome.reply["fulfillmentMessages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["text"]["text"][0], "a:\t2024-01-01");
    }

    #[test]
    fn period_lookup_without_period_is_invalid() {
        let mut roster = abc();
        let err = run("get-assignments-for-period", json!({}), &mut roster).unwrap_err();
        assert!(matches!(err, RotaError::InvalidInput(_)));
    }

    #[test]
    fn add_appends_and_reports_the_date() {
        let mut roster = abc();
        let params = json!({ "person": { "name": "dana" } });
        let outcome = run("add", params, &mut roster).unwrap();
        assert!(outcome.mutated);
        assert_eq!(
            outcome.reply["fulfillment_text"],
            "I added dana. He/she is scheduled for 2024-01-22."
        );
        assert_eq!(roster.len(), 4);
    }

    #[test]
    fn show_all_lists_everyone() {
        let mut roster = abc();
        let outcome = run("show-all", json!({}), &mut roster).unwrap();
        let messages = outcome.reply["fulfillmentMessages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn show_all_on_empty_roster_says_so() {
        let mut roster = Roster::new();
        let outcome = run("show-all", json!({}), &mut roster).unwrap();
        assert_eq!(
            outcome.reply["fulfillment_text"],
            "There are no users added yet."
        );
    }

    #[test]
    fn lookup_user_reports_the_date() {
        let mut roster = abc();
        let params = json!({ "person": { "name": "c" } });
        let outcome = run("lookup-user", params, &mut roster).unwrap();
        assert_eq!(
            outcome.reply["fulfillment_text"],
            "c is scheduled for 2024-01-15."
        );
    }

    #[test]
    fn remove_drops_the_user() {
        let mut roster = abc();
        let params = json!({ "person": { "name": "b" } });
        let outcome = run("remove", params, &mut roster).unwrap();
        assert!(outcome.mutated);
        assert_eq!(
            outcome.reply["fulfillment_text"],
            "Ok, I removed b from the list."
        );
        assert!(roster.get("b").is_err());
    }

    #[test]
    fn swap_exchanges_two_users() {
        let mut roster = abc();
        let params = json!({
            "person": { "name": "a" },
            "other_person": { "name": "c" }
        });
        let outcome = run("swap", params, &mut roster).unwrap();
        assert!(outcome.mutated);
        assert_eq!(outcome.reply["fulfillment_text"], "Ok, I swapped a and c.");
        assert_eq!(roster.get("c").unwrap().date, date(2024, 1, 1));
    }

    #[test]
    fn delay_next_shifts_only_the_upcoming_suffix() {
        let mut roster = abc();
        let outcome = run("delay-next", json!({ "duration": 1 }), &mut roster).unwrap();
        assert_eq!(
            outcome.reply["fulfillment_text"],
            "Ok, I delayed the next assignment with 1 day."
        );
        assert_eq!(roster.get("a").unwrap().date, date(2024, 1, 1));
        assert_eq!(roster.get("b").unwrap().date, date(2024, 1, 9));
    }

    #[test]
    fn delay_all_uses_plural_phrase() {
        let mut roster = abc();
        let outcome = run("delay-all", json!({ "duration": 3 }), &mut roster).unwrap();
        assert_eq!(
            outcome.reply["fulfillment_text"],
            "Ok, I delayed all assignments with 3 days."
        );
        assert_eq!(roster.get("a").unwrap().date, date(2024, 1, 4));
    }

    #[test]
    fn duration_accepts_sys_duration_struct() {
        let parameters = json!({ "duration": { "amount": 2, "unit": "day" } });
        assert_eq!(duration_days(&parameters).unwrap(), 2);
    }

    #[test]
    fn unknown_action_falls_back() {
        let mut roster = abc();
        let outcome = run("make-coffee", json!({}), &mut roster).unwrap();
        assert!(!outcome.mutated);
        assert_eq!(outcome.reply["fulfillment_text"], FALLBACK_TEXT);
    }
}
