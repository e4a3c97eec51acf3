//! End-to-end behavior of the custom field engine through its public API.
//!
//! Each test opens its own SQLite database in a temp directory.

use std::sync::Arc;

use cfengine::customfields::{CustomFieldManager, FormOptions};
use cfengine::error::{Error, FieldError, ValueError};
use cfengine::jobs::{self, JobQueue, MaintenanceJob, RecordingQueue, run_job};
use cfengine::store::{SharedStore, SqliteStore, Store};
use cfengine::types::{
    ContentType, CustomField, CustomFieldChoice, CustomFieldData, CustomFieldType, Record,
};
use serde_json::{Value, json};
use tempfile::TempDir;

struct TestContext {
    _temp_dir: TempDir,
    store: SharedStore,
    queue: Arc<RecordingQueue>,
    manager: CustomFieldManager,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("cfengine.db")).expect("open store");
        store.initialize().expect("initialize store");
        let store: SharedStore = Arc::new(store);
        let queue = Arc::new(RecordingQueue::new());
        let manager = CustomFieldManager::new(store.clone(), queue.clone());
        Self {
            _temp_dir: temp_dir,
            store,
            queue,
            manager,
        }
    }

    fn content_type(&self, model: &str) -> ContentType {
        self.store
            .get_or_create_content_type("dcim", model)
            .expect("content type")
    }

    fn field(&self, name: &str, field_type: CustomFieldType, ct: &ContentType) -> CustomField {
        let mut field = CustomField::new(name, field_type);
        field.content_types.insert(ct.id);
        self.manager.save_field(&mut field).expect("save field");
        field
    }

    fn choice(&self, field: &CustomField, value: &str) -> CustomFieldChoice {
        let choice = CustomFieldChoice::new(&field.id, value);
        self.manager.save_choice(&choice).expect("save choice");
        choice
    }

    fn record(&self, ct: &ContentType, pairs: &[(&str, Value)]) -> Record {
        let data: CustomFieldData = pairs.iter().map(|(k, v)| (*k, v.clone())).collect();
        let record = Record::new(ct.id, data);
        self.store.create_record(&record).expect("create record");
        record
    }

    fn run_queued_jobs(&self) -> usize {
        self.queue
            .take()
            .iter()
            .map(|job| run_job(self.store.as_ref(), job).expect("run job"))
            .sum()
    }

    fn reload(&self, record: &Record) -> Record {
        self.store
            .get_record(&record.id)
            .expect("get record")
            .expect("record exists")
    }
}

#[test]
fn changing_name_or_type_after_save_fails_and_keeps_stored_definition() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let field = ctx.field("serial", CustomFieldType::Text, &device);

    let mut renamed = field.clone();
    renamed.name = "serial_number".to_string();
    assert!(matches!(
        ctx.manager.save_field(&mut renamed),
        Err(Error::ImmutableField { attribute: "name" })
    ));

    let mut retyped = field.clone();
    retyped.field_type = CustomFieldType::Integer;
    assert!(matches!(
        ctx.manager.save_field(&mut retyped),
        Err(Error::ImmutableField { attribute: "type" })
    ));

    let stored = ctx.store.get_custom_field(&field.id).unwrap().unwrap();
    assert_eq!(stored.name, "serial");
    assert_eq!(stored.field_type, CustomFieldType::Text);
}

#[test]
fn integer_values_must_be_integral_and_within_bounds() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let mut field = CustomField::new("rack_units", CustomFieldType::Integer);
    field.validation_minimum = Some(1);
    field.validation_maximum = Some(5);
    field.content_types.insert(device.id);
    ctx.manager.save_field(&mut field).unwrap();

    let schema = ctx.manager.field_schema(&field.id).unwrap();
    for ok in [json!(1), json!(3), json!(5), json!(2.0)] {
        assert_eq!(schema.validate(&ok), Ok(()), "{ok}");
    }
    assert_eq!(schema.validate(&json!(0)), Err(ValueError::BelowMinimum(1)));
    assert_eq!(schema.validate(&json!(6)), Err(ValueError::AboveMaximum(5)));
    assert_eq!(schema.validate(&json!(2.5)), Err(ValueError::NotInteger));
    assert_eq!(schema.validate(&json!("three")), Err(ValueError::NotInteger));
}

#[test]
fn select_values_follow_the_current_choice_set() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let field = ctx.field("tier", CustomFieldType::Select, &device);
    ctx.choice(&field, "bronze");

    let schema = ctx.manager.field_schema(&field.id).unwrap();
    assert!(schema.validate(&json!("bronze")).is_ok());
    assert!(schema.validate(&json!("gold")).is_err());

    ctx.choice(&field, "gold");
    let schema = ctx.manager.field_schema(&field.id).unwrap();
    assert!(schema.validate(&json!("gold")).is_ok());
}

#[test]
fn bag_validation_reports_unknown_and_missing_together() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let mut owner = CustomField::new("owner", CustomFieldType::Text);
    owner.required = true;
    owner.content_types.insert(device.id);
    ctx.manager.save_field(&mut owner).unwrap();

    let record = ctx.record(&device, &[("legacy_id", json!("A-1"))]);
    let Err(Error::Validation(errors)) = ctx.manager.validate_record(&record) else {
        panic!("expected validation errors");
    };
    assert_eq!(
        errors.into_vec(),
        vec![
            FieldError::UnknownField {
                name: "legacy_id".to_string(),
            },
            FieldError::MissingRequiredField {
                name: "owner".to_string(),
            },
        ]
    );
}

#[test]
fn default_round_trips_into_initial_value() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");

    let mut text = CustomField::new("owner", CustomFieldType::Text);
    text.default = Some(json!("netops"));
    text.content_types.insert(device.id);
    ctx.manager.save_field(&mut text).unwrap();
    let form = ctx
        .manager
        .form_field(&text.id, FormOptions::default())
        .unwrap();
    assert_eq!(form.initial, Some(json!("netops")));

    let mut tier = ctx.field("tier", CustomFieldType::Select, &device);
    ctx.choice(&tier, "silver");
    tier.default = Some(json!("silver"));
    ctx.manager.save_field(&mut tier).unwrap();
    let form = ctx
        .manager
        .form_field(&tier.id, FormOptions::default())
        .unwrap();
    assert_eq!(form.initial, Some(json!("silver")));
    assert_eq!(form.parse_input(&json!("silver")), Ok(json!("silver")));
}

#[test]
fn renamed_choice_is_rewritten_in_record_data_by_the_job() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let field = ctx.field("environment", CustomFieldType::Select, &device);
    ctx.choice(&field, "prod");
    let mut stage = ctx.choice(&field, "stage");
    let record = ctx.record(&device, &[("environment", json!("stage"))]);
    let untouched = ctx.record(&device, &[("environment", json!("prod"))]);

    stage.value = "staging".to_string();
    ctx.manager.save_choice(&stage).unwrap();

    assert_eq!(
        ctx.queue.jobs(),
        vec![MaintenanceJob::RenameChoiceValue {
            field_id: field.id.clone(),
            old_value: "stage".to_string(),
            new_value: "staging".to_string(),
        }]
    );

    // Until the job runs, the stored value no longer names a choice.
    let stale = ctx.reload(&record);
    let Err(Error::Validation(errors)) = ctx.manager.validate_record(&stale) else {
        panic!("expected stale value to be reported");
    };
    assert!(matches!(
        errors.iter().next(),
        Some(FieldError::InvalidFieldValue { .. })
    ));

    assert_eq!(ctx.run_queued_jobs(), 1);

    let record = ctx.reload(&record);
    assert_eq!(record.cf().get("environment"), Some(&json!("staging")));
    ctx.manager.validate_record(&record).unwrap();
    let untouched = ctx.reload(&untouched);
    assert_eq!(untouched.cf().get("environment"), Some(&json!("prod")));
}

#[test]
fn record_missing_required_integer_reports_exactly_one_error() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let mut priority = CustomField::new("priority", CustomFieldType::Integer);
    priority.required = true;
    priority.validation_minimum = Some(1);
    priority.validation_maximum = Some(5);
    priority.content_types.insert(device.id);
    ctx.manager.save_field(&mut priority).unwrap();

    let record = ctx.record(&device, &[]);
    let Err(Error::Validation(errors)) = ctx.manager.validate_record(&record) else {
        panic!("expected validation errors");
    };
    assert_eq!(
        errors.into_vec(),
        vec![FieldError::MissingRequiredField {
            name: "priority".to_string(),
        }]
    );
}

#[test]
fn default_choice_cannot_be_deleted() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let mut tier = CustomField::new("tier", CustomFieldType::Select);
    tier.required = true;
    tier.content_types.insert(device.id);
    ctx.manager.save_field(&mut tier).unwrap();
    let gold = ctx.choice(&tier, "gold");
    tier.default = Some(json!("gold"));
    ctx.manager.save_field(&mut tier).unwrap();

    assert!(matches!(
        ctx.manager.delete_choice(&gold.id),
        Err(Error::ChoiceIsDefault { .. })
    ));
    assert!(ctx.store.get_choice(&gold.id).unwrap().is_some());
}

#[test]
fn choice_in_use_by_any_assigned_type_cannot_be_deleted() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let site = ctx.content_type("site");
    let mut roles = CustomField::new("roles", CustomFieldType::MultiSelect);
    roles.content_types.insert(device.id);
    roles.content_types.insert(site.id);
    ctx.manager.save_field(&mut roles).unwrap();
    let edge = ctx.choice(&roles, "edge");
    let spare = ctx.choice(&roles, "spare");
    ctx.record(&site, &[("roles", json!(["edge"]))]);

    assert!(matches!(
        ctx.manager.delete_choice(&edge.id),
        Err(Error::ChoiceInUse { .. })
    ));
    ctx.manager.delete_choice(&spare.id).unwrap();
    assert!(ctx.store.get_choice(&edge.id).unwrap().is_some());
    assert!(ctx.store.get_choice(&spare.id).unwrap().is_none());
}

#[test]
fn deleting_a_field_purges_its_key_from_assigned_types_only() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let site = ctx.content_type("site");
    let field = ctx.field("asset_tag", CustomFieldType::Text, &device);
    let on_device = ctx.record(&device, &[("asset_tag", json!("AT-1"))]);
    let on_site = ctx.record(&site, &[("asset_tag", json!("AT-2"))]);

    ctx.manager.delete_field(&field.id).unwrap();
    assert!(ctx.store.get_custom_field(&field.id).unwrap().is_none());
    // The data stays until the job runs.
    assert!(ctx.reload(&on_device).cf().contains_key("asset_tag"));

    assert_eq!(ctx.run_queued_jobs(), 1);
    assert!(ctx.reload(&on_device).cf().is_empty());
    assert_eq!(
        ctx.reload(&on_site).cf().get("asset_tag"),
        Some(&json!("AT-2"))
    );
}

#[test]
fn rejected_edits_schedule_no_jobs() {
    let ctx = TestContext::new();
    let device = ctx.content_type("device");
    let field = ctx.field("tier", CustomFieldType::Select, &device);
    ctx.choice(&field, "gold");

    let mut stray = CustomFieldChoice::new(&field.id, "gold");
    stray.weight = 50;
    assert!(matches!(
        ctx.manager.save_choice(&stray),
        Err(Error::AlreadyExists)
    ));
    assert!(ctx.manager.delete_field("no-such-field").is_err());
    assert!(ctx.queue.jobs().is_empty());
}

#[tokio::test]
async fn worker_applies_jobs_from_the_channel() {
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("cfengine.db")).unwrap();
    store.initialize().unwrap();
    let store: SharedStore = Arc::new(store);

    let (queue, worker) = jobs::channel(store.clone(), "custom_fields");
    let queue: Arc<dyn JobQueue> = Arc::new(queue);
    let manager = CustomFieldManager::new(store.clone(), queue.clone());
    let handle = tokio::spawn(worker.run());

    let device = store.get_or_create_content_type("dcim", "device").unwrap();
    let mut field = CustomField::new("asset_tag", CustomFieldType::Text);
    field.content_types.insert(device.id);
    manager.save_field(&mut field).unwrap();
    let data: CustomFieldData = [("asset_tag", json!("AT-9"))].into_iter().collect();
    let mut record = Record::new(device.id, data);
    manager.save_record(&mut record).unwrap();

    manager.delete_field(&field.id).unwrap();
    drop(manager);
    drop(queue);

    let stats = handle.await.unwrap();
    assert_eq!(stats.jobs_completed, 1);
    assert_eq!(stats.records_updated, 1);
    let record = store.get_record(&record.id).unwrap().unwrap();
    assert!(record.cf().is_empty());
}
