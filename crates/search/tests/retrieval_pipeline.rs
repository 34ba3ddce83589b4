//! Retrieval strategies over a small statute corpus with real retrievers

use lexroute_common::embeddings::HashingEmbedder;
use lexroute_common::memory::ConversationMemory;
use lexroute_common::models::Document;
use lexroute_common::oracle::{ScriptedOracle, ScriptedReply};
use lexroute_search::retrieval::StopReason;
use lexroute_search::{
    fuse, BM25Retriever, HybridRetriever, MultiHopOrchestrator, MultiQueryExpander, Retriever,
    SubqueryLedger, VectorRetriever,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn statutes() -> Vec<Document> {
    [
        (24, "Section 24: a marriage is void if either party has a living spouse at the time; such bigamy is an offence."),
        (4, "Section 4: the bridegroom must have completed twenty-one years of age and the bride eighteen years of age."),
        (5, "Section 5: notice of the intended marriage shall be given in writing to the Marriage Officer of the district."),
        (7, "Section 7: any person may object within thirty days of the publication of the notice."),
        (17, "Section 17: an appeal lies to the district court within thirty days of the refusal to register."),
    ]
    .into_iter()
    .map(|(section, text)| Document::new(text).with_metadata("section", section as i64))
    .collect()
}

async fn retrievers(limit: usize) -> HybridRetriever {
    let lexical = BM25Retriever::new(statutes(), limit).unwrap();
    let dense = VectorRetriever::build(statutes(), Arc::new(HashingEmbedder::new(512)), limit)
        .await
        .unwrap();
    HybridRetriever::new(Arc::new(lexical), Arc::new(dense))
}

fn empty_memory() -> ConversationMemory {
    ConversationMemory::new(Arc::new(ScriptedOracle::new(vec![])), 3)
}

fn starts_with(documents: &[Document], prefix: &str) -> bool {
    documents.iter().any(|d| d.content().starts_with(prefix))
}

#[tokio::test]
async fn bm25_prefers_rare_shared_terms() {
    let bm25 = BM25Retriever::new(statutes(), 3).unwrap();
    let ranked = bm25.retrieve("bridegroom age").await.unwrap();

    assert_eq!(ranked.len(), 3);
    assert!(ranked[0].content().starts_with("Section 4"));
}

#[tokio::test]
async fn hybrid_fusion_keeps_lexical_winner_near_top() {
    let hybrid = retrievers(5).await;
    let (lexical, dense) = hybrid.retrieve_both("bigamy living spouse").await.unwrap();
    assert!(lexical[0].content().starts_with("Section 24"));
    assert_eq!(dense.len(), 5);

    let fused = hybrid.retrieve_fused("bigamy living spouse", 3).await.unwrap();
    assert_eq!(fused.len(), 3);
    assert!(starts_with(&fused, "Section 24"));
}

#[tokio::test]
async fn fusing_a_list_with_itself_preserves_order() {
    let bm25 = BM25Retriever::new(statutes(), 5).unwrap();
    let ranked = bm25.retrieve("thirty days district").await.unwrap();

    let fused = fuse(vec![ranked.clone(), ranked.clone()], 0);
    assert_eq!(fused, ranked);
}

#[tokio::test]
async fn multi_query_fuses_every_paraphrase() {
    let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedReply::Structured(json!({
        "generatedQueries": [
            "notice of intended marriage",
            "written notice to the Marriage Officer",
            "how to give notice before marrying"
        ]
    }))]));
    let expander = MultiQueryExpander::new(oracle.clone(), retrievers(5).await, 3);

    let documents = expander
        .expand("What notice must be given before a marriage?", &empty_memory())
        .await
        .unwrap();

    assert_eq!(documents.len(), 3);
    assert!(starts_with(&documents, "Section 5"));
    let distinct: HashSet<&str> = documents.iter().map(|d| d.content()).collect();
    assert_eq!(distinct.len(), documents.len());
    assert!(oracle.prompts()[0].contains("What notice must be given before a marriage?"));
}

#[tokio::test]
async fn multi_query_survives_unparseable_paraphrases() {
    let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedReply::Malformed(
        "Sure! Here are some queries".to_string(),
    )]));
    let expander = MultiQueryExpander::new(oracle, retrievers(5).await, 3);

    let documents = expander.expand("appeal", &empty_memory()).await.unwrap();
    assert!(documents.len() <= 3);
}

#[tokio::test]
async fn multi_hop_collects_documents_per_subquery() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        ScriptedReply::Structured(json!({ "end_of_generation": false, "subquery": "minimum age of the bridegroom" })),
        ScriptedReply::Structured(json!({ "end_of_generation": false, "subquery": "appeal against refusal to register" })),
        ScriptedReply::Structured(json!({ "end_of_generation": true, "subquery": "" })),
    ]));
    let orchestrator = MultiHopOrchestrator::new(oracle.clone(), retrievers(5).await, 2, 5);

    let mut ledger = SubqueryLedger::new();
    let outcome = orchestrator
        .run("Can a 19 year old groom appeal a refused registration?", &empty_memory(), &mut ledger)
        .await
        .unwrap();

    assert_eq!(outcome.hops, 3);
    assert_eq!(outcome.stop, StopReason::EndOfGeneration);
    assert_eq!(ledger.len(), 2);

    let age = ledger.get("minimum age of the bridegroom").unwrap();
    assert_eq!(age.len(), 2);
    assert!(age[0].content().starts_with("Section 4"));

    let transcript = ledger.render();
    assert!(transcript.starts_with("### Subqueries + Retrieved Documents\n1. Subquery: minimum age"));
    assert!(transcript.contains("2. Subquery: appeal against refusal to register"));

    // the third decision saw both earlier hops
    assert!(oracle.prompts()[2].contains("2. Subquery: appeal against refusal to register"));
}
