extern crate copybook_import;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use copybook_import::flat_record;
use copybook_import::{EntityRegistry, ImportContext, Layout, LineParser};
use rust_decimal::Decimal;

flat_record! {
    pub struct Rider {
        fields {
            rider_code: String,
            rider_value: Option<Decimal>,
            line_number: Option<i64>,
        }
    }
}

flat_record! {
    pub struct Policy {
        fields {
            record_type: String,
            policy_number: String,
            issue_date: Option<NaiveDate>,
            premium: Option<Decimal>,
            active: Option<bool>,
            rider_count: Option<i64>,
            import_tag: String,
            imported_at_utc: Option<DateTime<Utc>>,
        }
        collections {
            riders: Rider,
        }
    }
}

fn registry() -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    registry.register::<Policy>("Policy");
    registry.register::<Rider>("Rider");
    registry
}

fn ctx() -> ImportContext {
    ImportContext {
        imported_at_utc: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        source_system: "MAINFRAME-A".to_string(),
        batch_id: "B42".to_string(),
    }
}

fn layout() -> Layout {
    Layout::from_file("tests/policy_layout.yaml").unwrap()
}

/// Header: type(2) policy(6) date(8) premium(11) active(1) count(2),
/// then four 10-char rider slots from column 31.
fn line(date: &str, premium: &str, active: &str, count: &str, riders: &str) -> String {
    format!(
        "PO{policy}{date}{premium}{active}{count}{riders:<40}",
        policy = "POL123",
        date = date,
        premium = premium,
        active = active,
        count = count,
        riders = riders
    )
}

#[test]
fn test_graph_import_end_to_end() {
    let layout = layout();
    let registry = registry();
    let ctx = ctx();
    let parser = LineParser::new(&layout, &registry, &ctx);

    let line = line(
        "20240131",
        "0000012345J",
        "Y",
        " 2",
        "RDA 000150RDB 000275RDC 000999",
    );
    let policy: Policy = parser.parse_graph(&line).unwrap();

    assert_eq!(policy.record_type, "PO");
    assert_eq!(policy.policy_number, "POL123");
    assert_eq!(
        policy.issue_date,
        Some(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
    );
    // Overpunched J flips the sign; two implied decimal places.
    assert_eq!(policy.premium, Some("-1234.51".parse().unwrap()));
    assert_eq!(policy.active, Some(true));
    assert_eq!(policy.rider_count, Some(2));
    assert_eq!(policy.import_tag, "MAINFRAME-A:B42");
    assert_eq!(policy.imported_at_utc, Some(ctx.imported_at_utc));

    // Count termination: the third slot holds data but stays unread.
    assert_eq!(policy.riders.len(), 2);
    assert_eq!(policy.riders[0].rider_code, "RDA");
    assert_eq!(policy.riders[0].rider_value, Some("1.50".parse().unwrap()));
    assert_eq!(policy.riders[0].line_number, Some(1));
    assert_eq!(policy.riders[1].rider_code, "RDB");
    assert_eq!(policy.riders[1].rider_value, Some("2.75".parse().unwrap()));
    assert_eq!(policy.riders[1].line_number, Some(2));
}

#[test]
fn test_absent_fields_come_back_null() {
    let layout = layout();
    let registry = registry();
    let ctx = ctx();
    let parser = LineParser::new(&layout, &registry, &ctx);

    let line = line("00000000", "           ", " ", " 0", "");
    let policy: Policy = parser.parse_graph(&line).unwrap();

    assert_eq!(policy.issue_date, None);
    assert_eq!(policy.premium, None);
    assert_eq!(policy.active, None);
    assert_eq!(policy.rider_count, Some(0));
    assert!(policy.riders.is_empty());
}

#[test]
fn test_single_mode_skips_occurs_groups() {
    let layout = layout();
    let registry = registry();
    let ctx = ctx();
    let parser = LineParser::new(&layout, &registry, &ctx);

    let line = line("20240131", "00000100000", "N", " 2", "RDA 000150RDB 000275");
    let policy: Policy = parser.parse_single(&line).unwrap();

    assert_eq!(policy.premium, Some("1000.00".parse().unwrap()));
    assert_eq!(policy.active, Some(false));
    assert!(policy.riders.is_empty());
}

#[test]
fn test_string_rule_applies_case_normalization() {
    let layout = layout();
    let registry = registry();
    let ctx = ctx();
    let parser = LineParser::new(&layout, &registry, &ctx);

    let line = format!("po{:<70}", "pol999");
    let policy: Policy = parser.parse_single(&line).unwrap();
    assert_eq!(policy.record_type, "PO");
    assert_eq!(policy.policy_number, "POL999");
}

#[test]
fn test_malformed_line_is_a_record_error() {
    let layout = layout();
    let registry = registry();
    let ctx = ctx();
    let parser = LineParser::new(&layout, &registry, &ctx);

    let line = line("31JANUARY", "0000012345J", "Y", " 1", "RDA 000150");
    let err = parser.parse_graph::<Policy>(&line).unwrap_err();
    assert!(err.kind().is_record_error());
}

#[test]
fn test_layout_against_wrong_entity_is_a_config_error() {
    let layout = layout();
    let registry = registry();
    let ctx = ctx();
    let parser = LineParser::new(&layout, &registry, &ctx);

    // Rider has none of the header targets.
    let line = line("20240131", "00000000000", "Y", " 0", "");
    let err = parser.parse_single::<Rider>(&line).unwrap_err();
    assert!(!err.kind().is_record_error());
}

#[test]
fn test_shared_parser_across_threads() {
    use std::sync::Arc;
    use std::thread;

    let layout = Arc::new(layout());
    let registry = Arc::new(registry());
    let ctx = Arc::new(ctx());

    let mut handles = Vec::new();
    for worker in 0..4 {
        let layout = Arc::clone(&layout);
        let registry = Arc::clone(&registry);
        let ctx = Arc::clone(&ctx);
        handles.push(thread::spawn(move || {
            let parser = LineParser::new(&layout, &registry, &ctx);
            for i in 0..50 {
                let line = line(
                    "20240131",
                    "0000012345J",
                    "Y",
                    " 2",
                    "RDA 000150RDB 000275",
                );
                let policy: Policy = parser.parse_graph(&line).unwrap();
                assert_eq!(policy.riders.len(), 2, "worker {} line {}", worker, i);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
