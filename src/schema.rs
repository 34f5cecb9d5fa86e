diesel::table! {
    clients (id) {
        id -> Text,
        display_name -> Nullable<Text>,
        redirect_uris -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    authorization_codes (code) {
        code -> Text,
        client_id -> Text,
        redirect_uri -> Text,
        upstream_user_id -> Text,
        upstream_token -> Text,
        scopes -> Jsonb,
        code_challenge -> Text,
        code_challenge_method -> Text,
        expires_at -> Timestamptz,
        used -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    refresh_tokens (id) {
        id -> Uuid,
        token -> Text,
        client_id -> Text,
        upstream_user_id -> Text,
        upstream_token -> Text,
        scopes -> Jsonb,
        expires_at -> Timestamptz,
        revoked_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    access_token_sessions (id) {
        id -> Uuid,
        jti -> Uuid,
        client_id -> Text,
        upstream_user_id -> Text,
        upstream_token -> Text,
        scopes -> Jsonb,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
        upstream_invalid_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    clients,
    authorization_codes,
    refresh_tokens,
    access_token_sessions,
);
