// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde_json::json;
use volera_config::model::ResearchConfig;
use volera_core::events::OutboundEvent;
use volera_core::types::CheckpointStatus;
use volera_graph::Sink;
use volera_research::RETRY_PROMPT;
use volera_test_utils::{hit, image_hit, MockCrawler, MockProvider, MockReply, MockSearch, TestHarness};
use volera_tools::shorten;
use volera_tools::rerank::score;

const IDEAPAD: &str = "https://amazon.example/ideapad-slim-3";

fn research(review_target: usize, max_depth: u32) -> ResearchConfig {
    ResearchConfig {
        review_target,
        max_depth,
        ..ResearchConfig::default()
    }
}

fn laptop_plan() -> MockReply {
    MockReply::json(json!({
        "action": "__researcher__",
        "no_of_results": 10,
        "search_queries": [{"site": "amazon", "query": "lenovo laptop", "source": "amazon"}],
        "researcher_agent_instructions": "laptops only",
        "filter_criteria": "price under 800 USD"
    }))
}

fn ideapad_extraction() -> MockReply {
    MockReply::json(json!({
        "products": [{
            "name": "Lenovo IdeaPad Slim 3 laptop",
            "brand": "Lenovo",
            "current_price": 549.99,
            "currency": "$",
            "url": IDEAPAD
        }]
    }))
}

fn passed(ids: &[&str]) -> MockReply {
    MockReply::json(json!({"status": "__passed__", "product_ids": ids, "comment": "fits"}))
}

fn comments(events: &[OutboundEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            OutboundEvent::Progress { comment: Some(c), .. } => Some(c.clone()),
            _ => None,
        })
        .collect()
}

fn error_keys(events: &[OutboundEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            OutboundEvent::Error { key, .. } => Some(key.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn happy_path_sends_reviewed_products() {
    let provider = MockProvider::new();
    provider.push_for("plan", laptop_plan());
    provider.always_for("products", ideapad_extraction());
    provider.push_for("review", passed(&[&shorten(IDEAPAD)]));
    provider.push(MockReply::Text("The IdeaPad Slim 3 is light and affordable.".into()));

    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(
            MockSearch::new()
                .with_results("lenovo laptop", vec![hit("IdeaPad Slim 3", IDEAPAD)])
                .with_images(vec![image_hit("IdeaPad", IDEAPAD, "https://img.example/ideapad.jpg")]),
        )
        .with_crawler(
            MockCrawler::new()
                .with_page(IDEAPAD, "Lenovo IdeaPad Slim 3 laptop. Price $549.99.")
                .with_reachable("https://img.example/ideapad.jpg"),
        )
        .with_research(research(1, 3))
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-happy", "lightweight laptop under $800 for college").await.unwrap();
    assert_eq!(outcome.sink, Sink::End);

    let events = h.events("ws-happy");
    let product = events
        .iter()
        .find_map(|e| match e {
            OutboundEvent::Product { products, chat_id, role, .. } => Some((products.clone(), chat_id.clone(), role.clone())),
            _ => None,
        })
        .expect("product event");
    assert_eq!(product.1, "ws-happy");
    assert_eq!(product.2, "assistant");
    assert!(!product.0.is_empty());
    assert!(product.0[0].current_price <= 800.0);
    assert_eq!(product.0[0].product_id, shorten(IDEAPAD));
    assert_eq!(product.0[0].source.as_deref(), Some("amazon"));

    let kinds = h.sink.kinds_for("ws-happy");
    assert_eq!(
        kinds[kinds.len() - 6..],
        ["sources", "message", "product", "image_search", "messageEnd", "search_complete"]
    );
    assert!(events.iter().any(|e| matches!(e, OutboundEvent::ImageSearch { data } if data.len() == 1)));

    // plan + extraction + review + answer at 1 credit each, plus the research charge.
    assert_eq!(h.balance().await.unwrap(), 1_000 - 4 - 100);
    assert_eq!(outcome.state.reply.as_deref(), Some("The IdeaPad Slim 3 is light and affordable."));
    assert_eq!(outcome.state.task_id, None);
    assert_eq!(outcome.state.searched_queries.len(), 1);
}

#[tokio::test]
async fn clarifying_question_suspends_until_the_user_answers() {
    let provider = MockProvider::new();
    provider.push_for(
        "plan",
        MockReply::json(json!({"action": "__user__", "content": "What is your budget?"})),
    );
    provider.push_for(
        "plan",
        MockReply::json(json!({"action": "__user__", "content": "Any preferred brand?"})),
    );
    let h = TestHarness::builder().with_provider(provider).build().await.unwrap();

    let first = h.send("ws-clarify", "a good phone").await.unwrap();
    assert_eq!(first.sink, Sink::Human);
    assert!(h.events("ws-clarify").iter().any(
        |e| matches!(e, OutboundEvent::Message { content } if content == "What is your budget?")
    ));
    let (_, status) = h.graph.snapshot("ws-clarify").await.unwrap().unwrap();
    assert_eq!(status, CheckpointStatus::Suspended);

    let second = h.send("ws-clarify", "under 300 USD").await.unwrap();
    assert_eq!(second.sink, Sink::Human);
    let plans = h.provider.requests_for("plan");
    assert_eq!(plans.len(), 2);
    assert!(plans[1].prompt.contains("under 300 USD"));
    assert!(plans[1].prompt.contains("a good phone"));
    assert_eq!(second.state.human_response, None);
    assert!(h.search.requests().is_empty());
}

#[tokio::test]
async fn insufficient_credits_end_before_any_research() {
    let h = TestHarness::builder().with_balance(0).build().await.unwrap();

    let outcome = h.send("ws-broke", "lightweight laptop").await.unwrap();
    assert_eq!(outcome.sink, Sink::End);
    assert_eq!(error_keys(&h.events("ws-broke")), ["insufficient_credits"]);
    assert_eq!(h.provider.call_count(), 0);
    assert!(h.search.requests().is_empty());
    assert_eq!(h.balance().await.unwrap(), 0);
}

#[tokio::test]
async fn failed_fetches_are_skipped_and_the_planner_replans() {
    let provider = MockProvider::new();
    provider.always_for("plan", laptop_plan());
    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(MockSearch::new().with_results(
            "lenovo laptop",
            vec![hit("A", "https://shop.example/a"), hit("B", "https://shop.example/b")],
        ))
        .with_crawler(
            MockCrawler::new()
                .with_failure("https://shop.example/a", "503")
                .with_failure("https://shop.example/b", "timeout"),
        )
        .with_research(research(25, 1))
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-fail", "lightweight laptop").await.unwrap();
    let events = h.events("ws-fail");
    let comments = comments(&events);
    assert_eq!(comments.iter().filter(|c| c.starts_with("Skipped")).count(), 2);
    assert!(comments.iter().any(|c| c == "No products found, trying a new plan"));

    let plans = h.provider.requests_for("plan");
    assert!(plans.len() >= 2);
    assert!(plans[1].prompt.contains(RETRY_PROMPT));
    assert!(h.provider.requests_for("products").is_empty());

    // The depth guard stops the loop and hands control back to the user.
    assert_eq!(outcome.sink, Sink::Human);
    assert_eq!(outcome.state.searched_queries.len(), 1);
    assert!(outcome.state.all_products.is_empty());
    assert_eq!(h.balance().await.unwrap(), 1_000 - 2);
}

#[tokio::test]
async fn same_product_url_keeps_one_id_and_the_higher_score() {
    let provider = MockProvider::new();
    provider.push_for(
        "plan",
        MockReply::json(json!({
            "no_of_results": 5,
            "search_queries": [
                {"site": "amazon", "query": "lenovo ideapad slim laptop", "source": "amazon"},
                {"site": "bestbuy", "query": "kitchen kettle", "source": "bestbuy"}
            ],
        })),
    );
    provider.always_for(
        "products",
        MockReply::json(json!({
            "products": [{"name": "Lenovo IdeaPad Slim laptop", "current_price": 499.0, "url": "https://x/y"}]
        })),
    );
    provider.push_for("review", passed(&[&shorten("https://x/y")]));

    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(
            MockSearch::new()
                .with_results("lenovo ideapad", vec![hit("Listing", "https://amazon.example/p1")])
                .with_results("kitchen kettle", vec![hit("Deals", "https://bestbuy.example/p2")]),
        )
        .with_crawler(
            MockCrawler::new()
                .with_page("https://amazon.example/p1", "IdeaPad listing")
                .with_page("https://bestbuy.example/p2", "Deals page"),
        )
        .with_research(research(1, 2))
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-dedup", "lenovo laptop").await.unwrap();
    assert_eq!(outcome.sink, Sink::End);

    let all = &outcome.state.all_products;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].product_id, shorten("https://x/y"));
    let text = all[0].text_projection();
    let best = score("lenovo ideapad slim laptop", &text).max(score("kitchen kettle", &text));
    assert_eq!(all[0].relevance_score, best);
    assert!(best > 0.0);
    assert_eq!(outcome.state.reviewed_products_ids, [shorten("https://x/y")]);
}

#[tokio::test]
async fn depth_guard_presents_best_results_at_human() {
    let provider = MockProvider::new();
    provider.always_for("plan", laptop_plan());
    provider.always_for("products", ideapad_extraction());
    provider.push_for("review", passed(&[&shorten(IDEAPAD)]));

    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(MockSearch::new().with_results("lenovo laptop", vec![hit("IdeaPad", IDEAPAD)]))
        .with_crawler(MockCrawler::new().with_page(IDEAPAD, "IdeaPad page"))
        .with_research(research(25, 0))
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-depth", "lenovo laptop").await.unwrap();
    assert_eq!(outcome.sink, Sink::Human);
    assert_eq!(outcome.state.current_depth, 0);
    assert_eq!(outcome.state.next_node.as_deref(), Some("planner"));

    let events = h.events("ws-depth");
    assert!(events.iter().any(
        |e| matches!(e, OutboundEvent::Product { products, .. } if products.len() == 1)
    ));
    // The planner ran once: re-entering at max depth must not plan again.
    assert_eq!(h.provider.requests_for("plan").len(), 1);
    assert_eq!(h.balance().await.unwrap(), 1_000 - 3 - 100);

    let (_, status) = h.graph.snapshot("ws-depth").await.unwrap().unwrap();
    assert_eq!(status, CheckpointStatus::Suspended);
}

#[tokio::test]
async fn research_after_the_depth_guard_is_charged_as_a_new_run() {
    const THINKPAD: &str = "https://amazon.example/thinkpad-x1";
    let provider = MockProvider::new();
    provider.push_for("plan", laptop_plan());
    provider.push_for(
        "plan",
        MockReply::json(json!({
            "action": "__researcher__",
            "no_of_results": 10,
            "search_queries": [{"site": "amazon", "query": "thinkpad x1", "source": "amazon"}]
        })),
    );
    provider.push_for("products", ideapad_extraction());
    provider.push_for(
        "products",
        MockReply::json(json!({
            "products": [{
                "name": "Lenovo ThinkPad X1 Carbon",
                "brand": "Lenovo",
                "current_price": 1299.0,
                "currency": "$",
                "url": THINKPAD
            }]
        })),
    );
    provider.push_for("review", passed(&[&shorten(IDEAPAD)]));
    provider.push_for("review", passed(&[&shorten(THINKPAD)]));

    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(
            MockSearch::new()
                .with_results("lenovo laptop", vec![hit("IdeaPad", IDEAPAD)])
                .with_results("thinkpad x1", vec![hit("ThinkPad", THINKPAD)]),
        )
        .with_crawler(
            MockCrawler::new()
                .with_page(IDEAPAD, "IdeaPad page")
                .with_page(THINKPAD, "ThinkPad page"),
        )
        .with_research(research(25, 0))
        .build()
        .await
        .unwrap();

    let first = h.send("ws-rerun", "lenovo laptop").await.unwrap();
    assert_eq!(first.sink, Sink::Human);
    assert_eq!(h.balance().await.unwrap(), 1_000 - 3 - 100);

    let second = h.send("ws-rerun", "now a thinkpad instead").await.unwrap();
    assert_eq!(second.sink, Sink::Human);
    assert_ne!(second.state.run_id, first.state.run_id);
    assert_eq!(h.provider.requests_for("plan").len(), 2);
    assert!(h.provider.requests_for("plan")[1].prompt.contains("now a thinkpad instead"));
    // Both runs researched and both were charged in full.
    assert_eq!(h.balance().await.unwrap(), 1_000 - 2 * (3 + 100));

    let products: usize = h
        .events("ws-rerun")
        .iter()
        .filter(|e| matches!(e, OutboundEvent::Product { .. }))
        .count();
    assert_eq!(products, 2);
}

#[tokio::test]
async fn empty_plan_replans_without_searching() {
    let provider = MockProvider::new();
    provider.push_for(
        "plan",
        MockReply::json(json!({"action": "__researcher__", "no_of_results": 10, "search_queries": []})),
    );
    provider.push_for(
        "plan",
        MockReply::json(json!({"action": "__user__", "content": "Which brand do you prefer?"})),
    );

    let h = TestHarness::builder()
        .with_provider(provider)
        .with_research(research(5, 3))
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-empty", "a laptop").await.unwrap();
    assert_eq!(outcome.sink, Sink::Human);
    assert!(h.search.requests().is_empty());
    assert!(h.crawler.fetched().is_empty());
    assert!(h.provider.requests_for("products").is_empty());

    let plans = h.provider.requests_for("plan");
    assert_eq!(plans.len(), 2);
    assert!(!plans[0].prompt.contains(RETRY_PROMPT));
    assert!(plans[1].prompt.contains(RETRY_PROMPT));
    assert!(comments(&h.events("ws-empty")).iter().any(|c| c == "No products found, trying a new plan"));
    assert!(error_keys(&h.events("ws-empty")).is_empty());

    // Only the planner's re-entry advanced the depth.
    assert_eq!(outcome.state.current_depth, 1);
    assert_eq!(outcome.state.last_error, None);
    assert_eq!(h.balance().await.unwrap(), 1_000 - 2);
}

#[tokio::test]
async fn extraction_calls_stay_within_the_concurrency_cap() {
    const SLIM: &str = "https://amazon.example/ideapad-slim-5";
    let provider = MockProvider::new().with_delay(std::time::Duration::from_millis(40));
    provider.push_for("plan", laptop_plan());
    provider.always_for("products", ideapad_extraction());
    provider.push_for("review", passed(&[&shorten(IDEAPAD)]));

    let long_page = vec!["laptop"; 40].join(" ");
    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(MockSearch::new().with_results(
            "lenovo laptop",
            vec![hit("IdeaPad", IDEAPAD), hit("IdeaPad 5", SLIM)],
        ))
        .with_crawler(
            MockCrawler::new()
                .with_page(IDEAPAD, &long_page)
                .with_page(SLIM, &long_page),
        )
        .with_research(ResearchConfig {
            word_threshold: 30,
            extraction_concurrency: 2,
            review_target: 1,
            ..ResearchConfig::default()
        })
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-cap", "lenovo laptop").await.unwrap();
    assert_eq!(outcome.sink, Sink::End);
    assert_eq!(h.provider.requests_for("products").len(), 4);
    assert_eq!(h.provider.peak_in_flight(), 2);
}

#[tokio::test]
async fn daily_limit_mid_run_reports_an_error_and_ends() {
    let provider = MockProvider::new();
    provider.always_for("plan", laptop_plan());
    provider.always_for("products", ideapad_extraction());
    provider.push_for("review", passed(&[&shorten(IDEAPAD)]));

    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(MockSearch::new().with_results("lenovo laptop", vec![hit("IdeaPad", IDEAPAD)]))
        .with_crawler(MockCrawler::new().with_page(IDEAPAD, "IdeaPad page"))
        .with_daily_limit(2)
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-limit", "lenovo laptop").await.unwrap();
    assert_eq!(outcome.sink, Sink::End);
    assert_eq!(error_keys(&h.events("ws-limit")), ["daily_limit"]);
    assert!(h.provider.requests_for("review").is_empty());
    assert_eq!(outcome.state.last_error, None);
}

#[tokio::test]
async fn failing_search_is_skipped_with_a_comment() {
    let provider = MockProvider::new();
    provider.push_for(
        "plan",
        MockReply::json(json!({
            "search_queries": [
                {"site": "amazon", "query": "broken query", "source": "amazon"},
                {"site": "amazon", "query": "lenovo laptop", "source": "amazon"}
            ]
        })),
    );
    provider.always_for("products", ideapad_extraction());
    provider.push_for("review", passed(&[&shorten(IDEAPAD)]));

    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(
            MockSearch::new()
                .failing("broken")
                .with_results("lenovo laptop", vec![hit("IdeaPad", IDEAPAD)]),
        )
        .with_crawler(MockCrawler::new().with_page(IDEAPAD, "IdeaPad page"))
        .with_research(research(1, 3))
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-search", "lenovo laptop").await.unwrap();
    assert_eq!(outcome.sink, Sink::End);
    assert!(comments(&h.events("ws-search"))
        .iter()
        .any(|c| c.contains("\"broken query\" failed")));
    assert_eq!(outcome.state.searched_queries.len(), 2);
}

#[tokio::test]
async fn long_pages_are_extracted_in_two_halves() {
    let provider = MockProvider::new();
    provider.push_for("plan", laptop_plan());
    provider.always_for("products", ideapad_extraction());
    provider.push_for("review", passed(&[&shorten(IDEAPAD)]));

    let long_page = vec!["laptop"; 40].join(" ");
    let h = TestHarness::builder()
        .with_provider(provider)
        .with_search(MockSearch::new().with_results("lenovo laptop", vec![hit("IdeaPad", IDEAPAD)]))
        .with_crawler(MockCrawler::new().with_page(IDEAPAD, &long_page))
        .with_research(ResearchConfig {
            word_threshold: 30,
            review_target: 1,
            ..ResearchConfig::default()
        })
        .build()
        .await
        .unwrap();

    let outcome = h.send("ws-long", "lenovo laptop").await.unwrap();
    assert_eq!(outcome.sink, Sink::End);
    assert_eq!(h.provider.requests_for("products").len(), 2);
    // Both halves return the same product; it is kept once.
    assert_eq!(outcome.state.all_products.len(), 1);
}
