diesel::table! {
    chat_messages (id) {
        id -> Int8,
        session_id -> Text,
        user_id -> Text,
        display_name -> Text,
        content -> Text,
        created_at -> Timestamptz,
        deleted -> Bool,
        deleted_by -> Nullable<Text>,
    }
}
