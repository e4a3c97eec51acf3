pub const SCHEMA: &str = r#"
-- Record types that custom fields can be attached to
CREATE TABLE IF NOT EXISTS content_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app_label TEXT NOT NULL,
    model TEXT NOT NULL,

    UNIQUE(app_label, model)
);

-- Custom field definitions (the schema catalog)
CREATE TABLE IF NOT EXISTS custom_fields (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,     -- immutable once created
    label TEXT NOT NULL DEFAULT '',
    type TEXT NOT NULL DEFAULT 'text',  -- immutable once created
    description TEXT NOT NULL DEFAULT '',
    required INTEGER NOT NULL DEFAULT 0,
    filter_logic TEXT NOT NULL DEFAULT 'loose',
    default_value TEXT,            -- JSON document, NULL = no default
    weight INTEGER NOT NULL DEFAULT 100,

    -- Constraints
    validation_minimum INTEGER,    -- integer fields only
    validation_maximum INTEGER,    -- integer fields only
    validation_regex TEXT NOT NULL DEFAULT '',  -- text and url fields only

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Which record types a custom field applies to
CREATE TABLE IF NOT EXISTS custom_field_content_types (
    custom_field_id TEXT NOT NULL REFERENCES custom_fields(id) ON DELETE CASCADE,
    content_type_id INTEGER NOT NULL REFERENCES content_types(id) ON DELETE CASCADE,
    PRIMARY KEY (custom_field_id, content_type_id)
);

-- Allowed values for select and multi-select fields
CREATE TABLE IF NOT EXISTS custom_field_choices (
    id TEXT PRIMARY KEY,
    field_id TEXT NOT NULL REFERENCES custom_fields(id) ON DELETE CASCADE,
    value TEXT NOT NULL,
    weight INTEGER NOT NULL DEFAULT 100,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(field_id, value)
);

-- Records carrying custom field data as a JSON object
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    content_type_id INTEGER NOT NULL REFERENCES content_types(id) ON DELETE CASCADE,
    custom_field_data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_custom_fields_order ON custom_fields(weight, name);
CREATE INDEX IF NOT EXISTS idx_cf_content_types_ct ON custom_field_content_types(content_type_id);
CREATE INDEX IF NOT EXISTS idx_cf_choices_field ON custom_field_choices(field_id, weight, value);
CREATE INDEX IF NOT EXISTS idx_records_content_type ON records(content_type_id);
"#;
