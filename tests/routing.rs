//! End-to-end routing through all three stages

use std::sync::Arc;
use std::sync::atomic::Ordering;

use voxshell::model::{GenerateOptions, OFFLINE_DIAGNOSTIC};
use voxshell::response::CHAT_INTENT;
use voxshell::skills::builtin::DateTimeSkill;
use voxshell::{RouteKind, SemanticMatcher, Skill, SkillCatalog};

mod common;
use common::{Behavior, CountingIndex, Down, FakeSkill, Scripted, add, local_client, router};

const CHAT_REPLY: &str = r#"{"tool": null, "args": null, "response": "Hi there!"}"#;

fn date_catalog() -> SkillCatalog {
    SkillCatalog::new().with("date_time", || Ok(Arc::new(DateTimeSkill) as Arc<dyn Skill>))
}

#[tokio::test]
async fn date_question_resolves_by_pattern() {
    let router = router(date_catalog(), None, local_client(Arc::new(Down))).await;

    let routed = router.route_traced("what is the date").await;
    assert_eq!(routed.kind, RouteKind::Skill);
    assert_eq!(routed.response.intent, "get_date");
    assert!(routed.response.success);
    assert!(!routed.response.streaming);
    assert!(routed.response.text.starts_with("Today's date is"));
}

#[tokio::test]
async fn pattern_entities_reach_the_skill() {
    let mut catalog = SkillCatalog::new();
    add(&mut catalog, FakeSkill::new("weather", &["get_weather"], Behavior::EchoEntities));
    let router = router(catalog, None, local_client(Arc::new(Down))).await;

    let response = router.route("weather in tokyo").await;
    assert_eq!(response.intent, "get_weather");
    assert_eq!(response.text, "location=tokyo");

    let response = router.route("weather in Paris").await;
    assert_eq!(response.text, "location=Paris");
}

#[tokio::test]
async fn unregistered_pattern_intent_falls_through_to_model() {
    let model = Scripted::new(&[CHAT_REPLY], "");
    let mut catalog = SkillCatalog::new();
    let time = FakeSkill::new("time", &["get_time"], Behavior::Reply("noon"));
    let calls = time.counter();
    add(&mut catalog, time);
    let router = router(catalog, None, local_client(model.clone())).await;

    let routed = router.route_traced("weather in tokyo").await;
    assert_eq!(routed.kind, RouteKind::LlmChat);
    assert_eq!(routed.response.text, "Hi there!");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("get_time"));
    assert!(prompts[0].contains("User: weather in tokyo"));
}

#[tokio::test]
async fn chat_selection_is_returned_verbatim() {
    let router = router(SkillCatalog::new(), None, local_client(Scripted::new(&[CHAT_REPLY], ""))).await;

    let routed = router.route_traced("tell me something nice").await;
    assert_eq!(routed.kind, RouteKind::LlmChat);
    assert_eq!(routed.response.text, "Hi there!");
    assert!(!routed.response.streaming);
    assert_eq!(routed.response.intent, CHAT_INTENT);
}

#[tokio::test]
async fn malformed_selection_streams_fallback_chat() {
    let model = Scripted::new(&["sure, let me check that for you", "Here is a fallback answer."], "");
    let router = router(SkillCatalog::new(), None, local_client(model.clone())).await;

    let mut routed = router.route_traced("tell me a story").await;
    assert_eq!(routed.kind, RouteKind::LlmFallback);
    assert!(routed.response.streaming);
    assert_eq!(routed.response.collect_text().await, "Here is a fallback answer.");
    assert_eq!(model.prompts()[1], "User said: 'tell me a story'. Respond.");
}

#[tokio::test]
async fn unreachable_model_still_answers() {
    let router = router(SkillCatalog::new(), None, local_client(Arc::new(Down))).await;

    let mut response = router.route("anything at all").await;
    assert!(response.streaming);
    assert_eq!(response.collect_text().await, OFFLINE_DIAGNOSTIC);
}

#[tokio::test]
async fn empty_chat_response_streams_fresh_reply() {
    let model = Scripted::new(&[r#"{"tool": null, "response": ""}"#, "Hello friend."], "");
    let router = router(SkillCatalog::new(), None, local_client(model.clone())).await;

    let mut routed = router.route_traced("hey").await;
    assert_eq!(routed.kind, RouteKind::LlmChat);
    assert!(routed.response.streaming);
    assert_eq!(routed.response.intent, CHAT_INTENT);
    assert_eq!(routed.response.collect_text().await, "Hello friend.");
    assert_eq!(model.prompts()[1], "User said: 'hey'. You are Vox. Respond briefly.");
}

#[tokio::test]
async fn selected_tool_output_is_synthesized() {
    let model = Scripted::new(
        &[
            "```json\n{\"tool\": \"get_weather\", \"args\": {\"location\": \"Oslo\"}, \"response\": \"\"}\n```",
            "Bring an umbrella, it is raining in Oslo.",
        ],
        "",
    );
    let mut catalog = SkillCatalog::new();
    add(&mut catalog, FakeSkill::new("weather", &["get_weather"], Behavior::EchoEntities));
    let router = router(catalog, None, local_client(model.clone())).await;

    let mut routed = router.route_traced("should I bring an umbrella").await;
    assert_eq!(routed.kind, RouteKind::LlmTool("get_weather".to_string()));
    assert!(routed.response.streaming);
    assert_eq!(routed.response.intent, "get_weather");
    assert_eq!(
        routed.response.collect_text().await,
        "Bring an umbrella, it is raining in Oslo."
    );

    let synthesis = &model.prompts()[1];
    assert!(synthesis.contains("User asked: \"should I bring an umbrella\""));
    assert!(synthesis.contains("Tool 'get_weather' output: \"location=Oslo\""));
}

#[tokio::test]
async fn synthesis_keeps_skill_fields() {
    let model = Scripted::new(&[r#"{"tool": "get_time", "args": null}"#, "It's noon."], "");
    let mut catalog = SkillCatalog::new();
    add(&mut catalog, FakeSkill::new("clock", &["get_time"], Behavior::Refuse("clock unavailable")));
    let router = router(catalog, None, local_client(model)).await;

    let mut response = router.route("is it lunch yet").await;
    assert!(!response.success);
    assert_eq!(response.collect_text().await, "It's noon.");
}

#[tokio::test]
async fn failing_pattern_skill_falls_through() {
    for behavior in [Behavior::Fail, Behavior::Panic] {
        let model = Scripted::new(&[CHAT_REPLY], "");
        let mut catalog = SkillCatalog::new();
        let skill = FakeSkill::new("clock", &["get_time"], behavior);
        let calls = skill.counter();
        add(&mut catalog, skill);
        let router = router(catalog, None, local_client(model.clone())).await;

        let routed = router.route_traced("what time is it").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(routed.kind, RouteKind::LlmChat);
        assert_eq!(routed.response.text, "Hi there!");
        assert!(model.prompts()[0].contains("Already tried without success: get_time."));
    }
}

#[tokio::test]
async fn refusal_from_pattern_skill_is_final() {
    let mut catalog = SkillCatalog::new();
    add(&mut catalog, FakeSkill::new("clock", &["get_time"], Behavior::Refuse("no clock")));
    let router = router(catalog, None, local_client(Arc::new(Down))).await;

    let routed = router.route_traced("what time is it").await;
    assert_eq!(routed.kind, RouteKind::Skill);
    assert!(!routed.response.success);
    assert_eq!(routed.response.text, "no clock");
}

#[tokio::test]
async fn unlabelled_response_takes_pattern_intent() {
    let mut catalog = SkillCatalog::new();
    add(&mut catalog, FakeSkill::new("clock", &["get_time"], Behavior::Unlabelled("noon")));
    let router = router(catalog, None, local_client(Arc::new(Down))).await;

    let response = router.route("what time is it").await;
    assert_eq!(response.intent, "get_time");
}

#[tokio::test]
async fn semantic_stage_skipped_after_pattern_hit() {
    let index = CountingIndex::new();
    let semantic = SemanticMatcher::new(index.clone());
    let router = router(date_catalog(), Some(semantic), local_client(Scripted::new(&[], CHAT_REPLY))).await;

    let routed = router.route_traced("what is the date").await;
    assert_eq!(routed.kind, RouteKind::Skill);
    assert_eq!(index.query_count(), 0);

    router.route("sing me a song").await;
    assert_eq!(index.query_count(), 1);
}

#[tokio::test]
async fn semantic_match_runs_without_entities() {
    let mut catalog = SkillCatalog::new();
    let skill = FakeSkill::new("weather", &["get_weather"], Behavior::EchoEntities)
        .describe("Current weather forecast", &["do i need an umbrella today"]);
    add(&mut catalog, skill);

    let semantic = SemanticMatcher::new(CountingIndex::new());
    let router = router(catalog, Some(semantic), local_client(Arc::new(Down))).await;

    let routed = router.route_traced("do i need an umbrella today").await;
    assert_eq!(routed.kind, RouteKind::Semantic("get_weather".to_string()));
    assert_eq!(routed.response.intent, "get_weather");
    assert_eq!(routed.response.text, "");
}

#[tokio::test]
async fn unlabelled_semantic_response_takes_semantic_intent() {
    let mut catalog = SkillCatalog::new();
    add(
        &mut catalog,
        FakeSkill::new("news", &["get_news"], Behavior::Unlabelled("headlines"))
            .describe("Latest news headlines", &["what happened in the world today"]),
    );
    let router = router(
        catalog,
        Some(SemanticMatcher::new(CountingIndex::new())),
        local_client(Arc::new(Down)),
    )
    .await;

    let response = router.route("what happened in the world today").await;
    assert_eq!(response.intent, "get_news");
}

#[tokio::test]
async fn streamed_chat_matches_complete_reply() {
    let reply = "The quick brown fox jumps over the lazy dog.";
    let client = local_client(Scripted::new(&[], reply));

    let whole = client.generate_text("say it", GenerateOptions::default()).await;
    let streamed = client.generate("say it", GenerateOptions::streaming()).await.into_text().await;
    assert_eq!(streamed, whole);

    let model = Scripted::new(&[r#"{"tool": null}"#], reply);
    let router = router(SkillCatalog::new(), None, local_client(model)).await;
    let mut response = router.route("say it").await;
    assert!(response.streaming);
    assert_eq!(response.collect_text().await, whole);
}
