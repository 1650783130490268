#[cfg(test)]
mod underwriting_flow_tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use loan_a2a::{
        Payload, ResponseStatus, Result,
        agents::{DATAFETCHER, UNDERWRITER},
        llm::LanguageModel,
        search::{SearchHit, SearchReport, WebSearch, query_for},
        shared::{AppConfig, AppContext},
    };

    struct FixedModel;

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn generate(&self, _prompt: &str, _system: Option<&str>) -> Result<String> {
            Ok("stable cash flow".to_string())
        }
    }

    struct OfflineSearch;

    #[async_trait]
    impl WebSearch for OfflineSearch {
        async fn search(&self, business_name: &str, search_type: &str) -> Result<SearchReport> {
            Ok(SearchReport {
                business_name: business_name.to_string(),
                search_type: search_type.to_string(),
                query: query_for(business_name, search_type),
                results: vec![SearchHit {
                    title: format!("{} - Overview", business_name),
                    snippet: "Registered 2015".to_string(),
                    url: String::new(),
                    source: "fixture".to_string(),
                }],
                ai_summary: None,
            })
        }
    }

    async fn context() -> (tempfile::TempDir, AppContext) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gst.json"), r#"{"filings": 12}"#).unwrap();
        std::fs::write(dir.path().join("itr.json"), r#"{"income": 800000}"#).unwrap();

        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let context =
            AppContext::bootstrap(config, Arc::new(FixedModel), Arc::new(OfflineSearch)).await;
        (dir, context)
    }

    #[tokio::test]
    async fn test_bootstrap_registers_both_agents() {
        let (_dir, context) = context().await;

        assert!(context.exchange.is_registered(DATAFETCHER).await);
        assert!(context.exchange.is_registered(UNDERWRITER).await);
        assert_eq!(context.check_documents().await.unwrap(), vec!["bank_statement"]);
    }

    #[tokio::test]
    async fn test_gather_financials_fetches_available_subset() {
        let (_dir, context) = context().await;
        let required = vec![
            "gst".to_string(),
            "itr".to_string(),
            "bank_statement".to_string(),
        ];

        let findings = context
            .underwriter()
            .gather_financials(&required)
            .await
            .unwrap();

        assert_eq!(findings.fetched, vec!["gst", "itr"]);
        assert_eq!(findings.missing, vec!["bank_statement"]);
        let summary = findings.summary.unwrap();
        assert!(summary.contains("GST Analysis:\nstable cash flow"));
        assert!(summary.contains("COMPREHENSIVE ASSESSMENT"));

        let history = context.exchange.get_history().await;
        let actions: Vec<&str> = history.iter().map(|m| m.action.as_str()).collect();
        assert_eq!(actions, vec!["list_available", "fetch_and_analyze"]);
        assert!(history.iter().all(|m| m.sender == UNDERWRITER && m.receiver == DATAFETCHER));
        assert_eq!(
            history[1].payload_str_list("data_types"),
            vec!["gst", "itr"]
        );
    }

    #[tokio::test]
    async fn test_nothing_available_skips_fetch() {
        let (_dir, context) = context().await;

        let findings = context
            .underwriter()
            .gather_financials(&["bank_statement".to_string()])
            .await
            .unwrap();

        assert!(findings.summary.is_none());
        assert_eq!(context.exchange.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_search_applicant_prefers_business_name() {
        let (_dir, context) = context().await;

        let summary = context
            .underwriter()
            .search_applicant("R. Sharma", Some("Sharma Textiles"))
            .await
            .unwrap();
        assert_eq!(summary, "stable cash flow");

        let history = context.exchange.get_history().await;
        assert_eq!(history[0].payload_str("business_name"), Some("Sharma Textiles"));
        assert_eq!(history[0].payload_str("search_type"), Some("financial"));
    }

    #[tokio::test]
    async fn test_additional_documents_report_missing_inline() {
        let (_dir, context) = context().await;

        let summary = context
            .underwriter()
            .request_additional_documents(&["bank_statement".to_string()], "verify deposits")
            .await
            .unwrap();

        assert_eq!(summary, "BANK_STATEMENT: Data file bank_statement.json not found");
        assert_eq!(
            context.exchange.get_history().await[0].payload_str("analysis_type"),
            Some("detailed")
        );
    }

    #[tokio::test]
    async fn test_datafetcher_can_notify_underwriter() {
        let (_dir, context) = context().await;

        let response = context
            .exchange
            .send(DATAFETCHER, UNDERWRITER, "documents_ready", Payload::new(), None)
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Acknowledged);
    }

    #[tokio::test]
    async fn test_question_after_assessment() {
        let (_dir, context) = context().await;
        let underwriter = context.underwriter();

        let findings = underwriter
            .gather_financials(&["gst".to_string()])
            .await
            .unwrap();
        let answer = underwriter
            .ask("Is the applicant's cash flow stable?", &findings.summary.unwrap_or_default())
            .await
            .unwrap();

        assert_eq!(answer, "stable cash flow");
        // the question itself never crosses the exchange
        assert_eq!(context.exchange.history_len().await, 2);
    }
}
