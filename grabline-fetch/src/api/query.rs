//! Query URL construction for the post lookup operation.

use serde_json::{Value, json};
use url::Url;

use crate::error::FetchError;

/// Default query-operation id for the post lookup.
pub const DEFAULT_QUERY_ID: &str = "zAz9764BcLZOJ0JU2wrd1A";

/// Operation name appended to the query path.
pub const OPERATION_NAME: &str = "TweetResultByRestId";

/// Builds the lookup URL for one post.
///
/// The three parameter blocks are JSON-encoded into the `variables`,
/// `features` and `fieldToggles` query parameters. Only the post id varies
/// between calls, so equal ids produce byte-identical URLs.
pub fn post_query_url(api_host: &str, query_id: &str, post_id: &str) -> Result<String, FetchError> {
    let base = format!("https://{api_host}/i/api/graphql/{query_id}/{OPERATION_NAME}");
    let url = Url::parse_with_params(
        &base,
        &[
            ("variables", variables(post_id).to_string()),
            ("features", features().to_string()),
            ("fieldToggles", field_toggles().to_string()),
        ],
    )?;
    Ok(url.into())
}

fn variables(post_id: &str) -> Value {
    json!({
        "tweetId": post_id,
        "withCommunity": false,
        "includePromotedContent": false,
        "withVoice": false,
    })
}

fn features() -> Value {
    json!({
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "premium_content_api_read_enabled": false,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "responsive_web_grok_analyze_button_fetch_trends_enabled": false,
        "responsive_web_grok_analyze_post_followups_enabled": false,
        "responsive_web_jetfuel_frame": false,
        "responsive_web_grok_share_attachment_enabled": true,
        "articles_preview_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "responsive_web_grok_show_grok_translated_post": false,
        "responsive_web_grok_analysis_button_from_backend": false,
        "creator_subscriptions_quote_tweet_preview_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "profile_label_improvements_pcf_label_in_post_enabled": true,
        "rweb_tipjar_consumption_enabled": true,
        "verified_phone_label_enabled": false,
        "responsive_web_grok_image_annotation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_enhance_cards_enabled": false,
    })
}

fn field_toggles() -> Value {
    json!({
        "withArticleRichContentState": true,
        "withArticlePlainText": false,
        "withGrokAnalyze": false,
        "withDisallowedReplyControls": false,
    })
}
