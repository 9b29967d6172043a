table! {
    favorites (id) {
        id -> Integer,
        user_id -> Integer,
        tweet_id -> Integer,
        created_at -> Timestamp,
    }
}

table! {
    follows (id) {
        id -> Integer,
        follower_id -> Integer,
        following_id -> Integer,
        created_at -> Timestamp,
    }
}

table! {
    tweets (id) {
        id -> Integer,
        user_id -> Integer,
        msg -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    users (id) {
        id -> Integer,
        name -> Text,
        mailaddress -> Text,
        password_hash -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

joinable!(favorites -> tweets (tweet_id));
joinable!(favorites -> users (user_id));
joinable!(tweets -> users (user_id));

allow_tables_to_appear_in_same_query!(favorites, follows, tweets, users);
