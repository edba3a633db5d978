use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use nox_tickets_core::{
    AdditionalInfo, Category, LifecycleError, NewTicket, SqliteTicketStore, Ticket, TicketStatus,
    TicketStore,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Title(String),
    Description(String),
    Category(usize),
    Urgency(i64),
    Severity(i64),
    Info(String),
    Start(String),
    Finish,
    Cancel,
    Observe(String),
}

impl Op {
    /// Whether a successful call appends a modification.
    fn audited(&self) -> bool {
        !matches!(self, Op::Info(_) | Op::Observe(_))
    }
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-z]{1,12}",
        1 => Just(String::new()),
        1 => Just("   ".to_string()),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_text().prop_map(Op::Title),
        arb_text().prop_map(Op::Description),
        (0..Category::ALL.len()).prop_map(Op::Category),
        (-2i64..8).prop_map(Op::Urgency),
        (-2i64..8).prop_map(Op::Severity),
        arb_text().prop_map(Op::Info),
        arb_text().prop_map(Op::Start),
        Just(Op::Finish),
        Just(Op::Cancel),
        arb_text().prop_map(Op::Observe),
    ]
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
}

fn new_ticket() -> Ticket {
    Ticket::create_at(
        NewTicket {
            title: "Withdrawal blocked".to_string(),
            description: "Customer cannot withdraw funds".to_string(),
            category: Some(Category::Operational),
            subcategory: None,
            opened_by: "requester".to_string(),
            urgency: None,
            severity: None,
        },
        base_time(),
    )
    .unwrap()
}

fn apply(ticket: &mut Ticket, op: &Op, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    match op {
        Op::Title(v) => ticket.set_title_at(v, "editor", now),
        Op::Description(v) => ticket.set_description_at(v, "editor", now),
        Op::Category(i) => ticket.set_category_at(Category::ALL[*i], "editor", now),
        Op::Urgency(v) => ticket.set_urgency_at(*v, "editor", now),
        Op::Severity(v) => ticket.set_severity_at(*v, "editor", now),
        Op::Info(v) => ticket.set_additional_info(AdditionalInfo::from_raw(v, "", v, "", "")),
        Op::Start(v) => ticket.start_work_at(v, now),
        Op::Finish => ticket.finish_at("closer", now),
        Op::Cancel => ticket.cancel_at("closer", now),
        Op::Observe(v) => ticket.add_observation_at(v, "editor", now).map(|_| ()),
    }
}

fn run(ops: &[Op]) -> (Ticket, Vec<bool>, Vec<TicketStatus>) {
    let mut ticket = new_ticket();
    let mut outcomes = Vec::new();
    let mut statuses = vec![ticket.status()];
    for (i, op) in ops.iter().enumerate() {
        let now = base_time() + TimeDelta::minutes(i as i64 + 1);
        let before = ticket.clone();
        let ok = apply(&mut ticket, op, now).is_ok();
        if !ok {
            assert_eq!(ticket, before, "failed {op:?} mutated the ticket");
        }
        outcomes.push(ok);
        statuses.push(ticket.status());
    }
    (ticket, outcomes, statuses)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn levels_always_in_range(ops in prop::collection::vec(arb_op(), 0..40)) {
        let (ticket, _, _) = run(&ops);
        prop_assert!((1..=5).contains(&ticket.urgency().get()));
        prop_assert!((1..=5).contains(&ticket.severity().get()));
    }

    #[test]
    fn one_modification_per_successful_audited_op(ops in prop::collection::vec(arb_op(), 0..40)) {
        let (ticket, outcomes, _) = run(&ops);
        let expected = ops
            .iter()
            .zip(&outcomes)
            .filter(|(op, ok)| **ok && op.audited())
            .count();
        prop_assert_eq!(ticket.modifications().len(), expected);

        let observed = ops
            .iter()
            .zip(&outcomes)
            .filter(|(op, ok)| **ok && matches!(op, Op::Observe(_)))
            .count();
        prop_assert_eq!(ticket.observations().len(), observed);
    }

    #[test]
    fn status_moves_forward_only(ops in prop::collection::vec(arb_op(), 0..40)) {
        let (_, _, statuses) = run(&ops);
        for pair in statuses.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if from == to {
                continue;
            }
            let allowed = matches!(
                (from, to),
                (TicketStatus::Open, TicketStatus::InProgress)
                    | (TicketStatus::Open, TicketStatus::Cancelled)
                    | (TicketStatus::InProgress, TicketStatus::Finished)
                    | (TicketStatus::InProgress, TicketStatus::Cancelled)
            );
            prop_assert!(allowed, "illegal transition {from} -> {to}");
        }
    }

    #[test]
    fn timestamps_match_history(ops in prop::collection::vec(arb_op(), 0..40)) {
        let (ticket, _, statuses) = run(&ops);
        let passed_in_progress = statuses.contains(&TicketStatus::InProgress);
        prop_assert_eq!(ticket.started_at().is_some(), passed_in_progress);
        prop_assert_eq!(ticket.finished_at().is_some(), ticket.status() == TicketStatus::Finished);
        prop_assert_eq!(ticket.total_duration().is_some(), ticket.status() == TicketStatus::Finished);

        if let (Some(total), Some(exec)) = (ticket.total_duration(), ticket.execution_duration()) {
            prop_assert!(exec >= TimeDelta::zero());
            prop_assert!(total >= exec);
        }

        let times: Vec<_> = ticket.modifications().iter().map(|m| m.modified_at()).collect();
        prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn stored_ticket_reloads_identically(ops in prop::collection::vec(arb_op(), 0..25)) {
        let store = SqliteTicketStore::in_memory().unwrap();
        let mut ticket = new_ticket();
        store.create(&ticket).unwrap();

        for (i, op) in ops.iter().enumerate() {
            let now = base_time() + TimeDelta::minutes(i as i64 + 1);
            if apply(&mut ticket, op, now).is_ok() {
                store.update(&mut ticket).unwrap();
            }
            prop_assert_eq!(&store.get(ticket.id()).unwrap(), &ticket);
        }
    }
}
