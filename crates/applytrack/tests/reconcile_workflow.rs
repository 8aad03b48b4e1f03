use std::fs;
use std::path::Path;

use applytrack::config::MatcherConfig;
use applytrack::workflows::tracking::listing::{list_applications, missing_deadlines};
use applytrack::workflows::tracking::{
    ApplicationKey, ApplicationStatus, Area, EmailMatcher, FileRecordStore, OrganizeDriver,
    ReconciliationDriver, RecordStore,
};
use chrono::NaiveDate;
use serde_json::{json, Value};

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid run date")
}

fn write(path: &Path, value: Value) {
    fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
    fs::write(path, serde_json::to_string_pretty(&value).expect("encode")).expect("write");
}

fn read(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("decode")
}

/// Three active applications plus a mailbox with one message for each of them and some noise.
fn seed(root: &Path) {
    let applications = root.join("Solicitaties");
    write(
        &applications.join("Analist_—_UMCG/stats.json"),
        json!({"Response": "Unsent", "Rejected": false, "NextAction": "Wait"}),
    );
    write(
        &applications.join("Analist_—_UMCG/relevant_info.json"),
        json!({"Deadline": "2024.01.01", "Link": "https://werkenbij.umcg.nl/123"}),
    );
    write(
        &applications.join("Data_Engineer_—_Sopra_Steria/stats.json"),
        json!({"Response": "Pending"}),
    );
    write(
        &applications.join("Data_Engineer_—_Sopra_Steria/relevant_info.json"),
        json!({"Deadline": "onbekend"}),
    );
    write(
        &applications.join("Consultant_—_DataNorth/stats.json"),
        json!({"Response": "Unsent", "Rejected": null}),
    );
    write(
        &root.join("Email/Ongoing/Data_Engineer_—_Sopra_Steria/first.json"),
        json!({"subject": "Invitation", "response": "Interview Scheduled", "assigned": true}),
    );

    let inbox = root.join("Email/Processing");
    write(
        &inbox.join("m1.json"),
        json!({
            "from": "Sopra Steria <recruitment@soprasteria.com>",
            "subject": "Data Engineer: update on your application",
            "body": "Unfortunately we decided not to proceed.",
            "response": "Rejected",
            "company": null
        }),
    );
    write(
        &inbox.join("m2.json"),
        json!({
            "from": "hello@datanorth.ai",
            "subject": "We received your application",
            "response": "Received",
            "company": "DataNorth"
        }),
    );
    write(
        &inbox.join("m3.json"),
        json!({
            "from": "Nieuwsbrief <news@jobs.example>",
            "subject": "Nieuwe vacatures",
            "company": "DISCARD"
        }),
    );
    write(
        &inbox.join("m4.json"),
        json!({"from": "someone@example.com", "subject": "Hallo"}),
    );
}

#[test]
fn organize_and_reconcile_a_tracker_tree() {
    let root = tempfile::tempdir().expect("tempdir");
    seed(root.path());
    let store = FileRecordStore::open(root.path());

    let organized = OrganizeDriver::new(&store, EmailMatcher::new(MatcherConfig::default()))
        .run()
        .expect("organize completes");
    assert_eq!(organized.assigned, 2);
    assert_eq!(organized.discarded, 1);
    assert_eq!(organized.untriaged, 1);
    assert_eq!(organized.errors, 0);

    let summary = ReconciliationDriver::new(&store, run_date())
        .run()
        .expect("reconcile completes");
    assert_eq!(summary.active, 3);
    assert_eq!(summary.updated, 3);
    assert_eq!(summary.archived, 2);
    assert_eq!(summary.expired, 1);
    assert_eq!(summary.relocated_emails, 2);
    assert_eq!(summary.errors, 0);

    let archive = root.path().join("Solicitaties/1.Archief");
    let expired = read(&archive.join("Analist_—_UMCG/stats.json"));
    assert_eq!(expired["Response"], "Expired");
    assert_eq!(expired["NextAction"], "Wait");

    let rejected = read(&archive.join("Data_Engineer_—_Sopra_Steria/stats.json"));
    assert_eq!(rejected["Response"], "Rejected");
    assert_eq!(rejected["Rejected"], true);
    let archived_mail = root.path().join("Email/Archive/Data_Engineer_—_Sopra_Steria");
    assert!(archived_mail.join("first.json").exists());
    assert!(archived_mail.join("m1.json").exists());
    assert!(!root
        .path()
        .join("Email/Ongoing/Data_Engineer_—_Sopra_Steria")
        .exists());

    let received = read(
        &root
            .path()
            .join("Solicitaties/Consultant_—_DataNorth/stats.json"),
    );
    assert_eq!(received["Response"], "Received");
    assert_eq!(
        read(&root.path().join("Email/Ongoing/Consultant_—_DataNorth/m2.json"))["assigned"],
        true
    );

    let blocked = read(&root.path().join("Email/Processing/unrelated_email_senders.json"));
    assert_eq!(blocked, json!(["news@jobs.example"]));
    assert!(root.path().join("Email/Processing/m4.json").exists());
    assert!(!root.path().join("Email/Processing/m3.json").exists());
}

#[test]
fn reconciling_twice_is_a_no_op() {
    let root = tempfile::tempdir().expect("tempdir");
    seed(root.path());
    let store = FileRecordStore::open(root.path());

    OrganizeDriver::new(&store, EmailMatcher::default())
        .run()
        .expect("organize completes");
    let driver = ReconciliationDriver::new(&store, run_date());
    driver.run().expect("first run");
    let second = driver.run().expect("second run");

    assert!(second.is_quiescent(), "unexpected changes: {second:?}");
    assert_eq!(second.errors, 0);
    assert_eq!(second.archived_total, 2);
    assert_eq!(
        store
            .list_applications(Area::Archive)
            .expect("archive listing"),
        vec![
            ApplicationKey::new("Analist_—_UMCG"),
            ApplicationKey::new("Data_Engineer_—_Sopra_Steria"),
        ]
    );
    let status = store
        .read_status(&ApplicationKey::new("Analist_—_UMCG"))
        .expect("readable")
        .and_then(|record| record.status());
    assert_eq!(status, Some(ApplicationStatus::Expired));
}

#[test]
fn corrupt_status_record_is_isolated() {
    let root = tempfile::tempdir().expect("tempdir");
    seed(root.path());
    fs::write(
        root.path()
            .join("Solicitaties/Consultant_—_DataNorth/stats.json"),
        "{\"Response\": ",
    )
    .expect("corrupt stats");
    let store = FileRecordStore::open(root.path());

    let summary = ReconciliationDriver::new(&store, run_date())
        .run()
        .expect("reconcile completes");

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.archived, 1);
    let failed = summary
        .outcomes
        .iter()
        .find(|outcome| outcome.key.as_str() == "Consultant_—_DataNorth")
        .expect("outcome recorded");
    assert!(failed.error.is_some());
}

#[test]
fn listing_and_deadline_audit_read_the_same_tree() {
    let root = tempfile::tempdir().expect("tempdir");
    seed(root.path());
    let store = FileRecordStore::open(root.path());

    let listings = list_applications(&store).expect("listing");
    assert_eq!(listings.len(), 3);
    assert_eq!(listings[0].role, "Analist");
    assert_eq!(
        listings[0].application_link.as_deref(),
        Some("https://werkenbij.umcg.nl/123")
    );
    assert_eq!(
        listings[0].deadline,
        NaiveDate::from_ymd_opt(2024, 1, 1)
    );

    let missing = missing_deadlines(&store).expect("audit");
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].key.as_str(), "Data_Engineer_—_Sopra_Steria");
}
