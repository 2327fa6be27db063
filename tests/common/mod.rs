//! Common test utilities

use std::sync::Arc;
use std::time::Duration;

use feedsift::crawler::ResilientHttpClient;
use feedsift::utils::retry::RetryPolicy;

/// Client with short delays suitable for mock servers
pub fn test_client(max_attempts: u32) -> Arc<ResilientHttpClient> {
    Arc::new(
        ResilientHttpClient::with_config(
            1000,
            RetryPolicy::with_delays(max_attempts, 10, 100),
            Duration::from_secs(5),
            &[],
        )
        .expect("client should build"),
    )
}

/// Desktop page embedding one story in a framework payload
pub fn story_page(post_id: &str, message: &str, reactions: u64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>Example Cafe | Facebook</title>
<meta property="og:title" content="Example Cafe | Facebook">
<meta property="og:description" content="Example Cafe. 2,481 likes. Specialty coffee and cakes.">
<script type="application/json" data-sjs>{{"require":[["ScheduledServerJS","handle",null,[{{"__bbox":{{"result":{{"data":{{"user":{{"vanity":"example-cafe","id":"100064123456789","timeline_list_feed_units":{{"edges":[{{"node":{{"__typename":"Story","post_id":"{post_id}","message":{{"text":"{message}"}},"creation_time":1700000000,"feedback":{{"reaction_count":{{"count":{reactions}}},"comment_count":{{"total_count":3}}}}}}}}]}}}}}}}}}}}}]]]}}</script>
</head>
<body><div id="root"></div></body>
</html>"#
    )
}
