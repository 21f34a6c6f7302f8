//! Transcript invariants over arbitrary roster sizes and failure patterns.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use llm::{MockReply, ScriptedCompletionService};
use nodes::{CollaborationService, EventEmitter, RunOutcome, RunSettings};
use pipeline::{Agent, CollaborationEvent, CollaborationStore, Phase};
use store::MemoryStore;

fn reply(fails: bool, delay_ms: u64, text: String) -> MockReply {
    let inner = if fails {
        MockReply::unavailable()
    } else {
        MockReply::text(text)
    };
    MockReply::delayed(Duration::from_millis(delay_ms), inner)
}

async fn run_once(behaviour: Vec<(bool, u64)>, max_concurrency: usize) {
    let agents: Vec<Agent> = (0..behaviour.len())
        .map(|i| Agent::new(format!("Agent {i}"), "general", format!("You are agent {i}.")))
        .collect();
    let mut completion = ScriptedCompletionService::new();
    for (i, (fails, delay)) in behaviour.iter().enumerate() {
        completion = completion.when_persona(
            format!("You are agent {i}."),
            reply(*fails, *delay, format!("response {i}")),
        );
    }

    let store = Arc::new(MemoryStore::with_agents(agents.iter().cloned()));
    let settings = RunSettings {
        max_concurrency,
        ..RunSettings::default()
    };
    let service =
        CollaborationService::new(Arc::new(completion), store.clone(), store.clone(), settings);
    let c = service
        .create_collaboration("Prop", "Property run", agents.iter().map(|a| a.id.clone()).collect())
        .await
        .unwrap();

    let (emitter, mut rx) = EventEmitter::channel(2);
    let collect = async move {
        let mut ids = Vec::new();
        while let Some(event) = rx.recv().await {
            if let CollaborationEvent::Message { message } = event {
                ids.push(message.id);
            }
        }
        ids
    };
    let (outcome, emitted) = tokio::join!(service.send_message(c.id, "Do the thing", emitter), collect);
    assert_eq!(outcome.unwrap(), RunOutcome::Completed);

    let stored = store.load(c.id).await.unwrap().unwrap();
    let phases: Vec<Phase> = stored.messages().iter().filter_map(|m| m.phase).collect();

    // Planning, then one execution message per contributor, then integration.
    assert_eq!(phases.first(), Some(&Phase::Planning));
    assert_eq!(phases.last(), Some(&Phase::Integration));
    assert!(phases.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        phases.iter().filter(|p| **p == Phase::Execution).count(),
        agents.len() - 1
    );
    assert_eq!(phases.iter().filter(|p| **p == Phase::Integration).count(), 1);

    assert!(stored.is_completed());
    assert!(stored.final_result().is_some());

    let transcript: Vec<_> = stored.messages()[1..].iter().map(|m| m.id).collect();
    assert_eq!(emitted, transcript);

    // Contributions stay in roster order whatever the delays were.
    let contributors: Vec<_> = stored
        .phase_messages(Phase::Execution)
        .map(|m| m.agent_name.clone().unwrap())
        .collect();
    let expected: Vec<_> = (1..agents.len()).map(|i| format!("Agent {i}")).collect();
    assert_eq!(contributors, expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_transcript_follows_phase_order(
        behaviour in prop::collection::vec((any::<bool>(), 0u64..15), 1..6),
        max_concurrency in 1usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_once(behaviour, max_concurrency));
    }
}
