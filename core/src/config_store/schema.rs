// Diesel table definitions for the four read-only config-store tables.
// This crate never creates or migrates this database -- it is provisioned
// and populated externally; these declarations exist only so diesel can
// generate typed queries against it.

diesel::table! {
    database_configuration (id) {
        id -> Integer,
        dsn -> Nullable<Text>,
        connection_type -> Nullable<Text>,
        host -> Nullable<Text>,
        port -> Nullable<Integer>,
        database -> Nullable<Text>,
        db_schema -> Nullable<Text>,
        username -> Nullable<Text>,
        password -> Nullable<Text>,
    }
}

diesel::table! {
    email_configs (id) {
        id -> Integer,
        smtp_server -> Text,
        smtp_username -> Text,
        smtp_password -> Text,
        smtp_port -> Integer,
        to_email -> Nullable<Text>,
    }
}

diesel::table! {
    site_configs (id) {
        id -> Integer,
        site -> Text,
        email -> Text,
    }
}

diesel::table! {
    configurations_folders (id) {
        id -> Integer,
        base_dir -> Text,
    }
}
