//! Wayfarer - 对话式旅行规划编排引擎
//!
//! 演示入口：用 Mock 能力跑一个完整的里斯本会话（收集 → 检索 → 两轮人工确认
//! → 起草 → 预算 → 校验 → 完成），航班源故意配置为永久失败以展示部分失败隔离。

use std::sync::Arc;

use anyhow::Context;

use wayfarer::capability::{
    CapabilityFailure, DataSource, FailingSource, GreedyDrafter, MockExtractor, StaticSource,
};
use wayfarer::config::load_config;
use wayfarer::model::NormalizedResult;
use wayfarer::research::ResearchDispatcher;
use wayfarer::session::SessionRuntime;
use wayfarer::storage::InMemorySessionStore;
use wayfarer::workflow::{PhaseMachine, SelectionResponse, Turn};

fn demo_sources() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(StaticSource::new(
            "attractions",
            vec![
                NormalizedResult::new("att-1", "Castelo de São Jorge", "attractions")
                    .with_price(15.0)
                    .with_coordinate(38.7139, -9.1335),
                NormalizedResult::new("att-2", "Oceanário de Lisboa", "attractions")
                    .with_price(25.0)
                    .with_coordinate(38.7633, -9.0950),
                NormalizedResult::new("att-3", "Tram 28 ride", "attractions").with_price(3.0),
            ],
        )),
        Arc::new(StaticSource::new(
            "dining",
            vec![
                NormalizedResult::new("din-1", "Time Out Market", "dining").with_price(30.0),
                NormalizedResult::new("din-2", "Cervejaria Ramiro", "dining").with_price(45.0),
            ],
        )),
        Arc::new(StaticSource::new(
            "hotels",
            vec![
                NormalizedResult::new("hot-1", "Hotel Avenida", "hotels").with_price(110.0),
                NormalizedResult::new("hot-2", "Bairro Alto Hotel", "hotels").with_price(240.0),
            ],
        )),
        // 永久失败的源：展示部分失败隔离（其余源照常聚合）
        Arc::new(FailingSource::new(
            "flights",
            CapabilityFailure::permanent("route not served by any carrier"),
        )),
        Arc::new(StaticSource::new(
            "weather",
            vec![NormalizedResult::new("wx-1", "Sunny, 24°C", "weather")],
        )),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wayfarer::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let machine = PhaseMachine::new(
        Arc::new(MockExtractor),
        Arc::new(GreedyDrafter),
        ResearchDispatcher::new(
            demo_sources(),
            cfg.research.max_concurrency,
            cfg.research.retry_policy(),
        ),
        cfg.critic.critic_config(),
        cfg.app.max_replans,
    );
    let runtime = SessionRuntime::new(
        machine,
        Arc::new(InMemorySessionStore::new()),
        cfg.app.session_ttl(),
    );

    let session_id = SessionRuntime::generate_session_id();
    println!("session: {}\n", session_id);

    let turns = [
        "destination=Lisbon; days=3; travelers=2",
        "date=not decided; budget=1500; lodging=hotel; transport=flight",
    ];
    for text in turns {
        println!("> {}", text);
        let outcome = runtime
            .handle_turn(
                &session_id,
                None,
                Turn::Message {
                    text: text.to_string(),
                },
            )
            .await
            .context("Turn failed")?;
        println!("< {}\n", outcome.reply);
    }

    // 依次应答挂起的选择中断：每次选前两个候选
    loop {
        let Some(session) = runtime
            .snapshot(&session_id)
            .await
            .context("Snapshot failed")?
        else {
            break;
        };
        let Some(interrupt) = session.pending_interrupt else {
            break;
        };
        let chosen_ids: Vec<String> = interrupt
            .candidates
            .iter()
            .take(2)
            .map(|c| c.id.clone())
            .collect();
        println!("> selecting {:?} for {}", chosen_ids, interrupt.category);
        let outcome = runtime
            .handle_turn(
                &session_id,
                None,
                Turn::Selection {
                    response: SelectionResponse {
                        category: interrupt.category,
                        chosen_ids,
                        custom_additions: Vec::new(),
                    },
                },
            )
            .await
            .context("Selection turn failed")?;
        println!("< {}\n", outcome.reply);
    }

    if let Some(session) = runtime.snapshot(&session_id).await? {
        println!("phase: {}", session.phase);
        println!("turns: {}", session.turn_count);
        for (source, report) in &session.research {
            println!("research[{}]: {:?}", source, report.status);
        }
        if let Some(budget) = &session.budget {
            println!(
                "budget: {:.2} {} (range {:.2}-{:.2})",
                budget.expected, budget.currency, budget.low, budget.high
            );
        }
        if let Some(plan) = &session.plan {
            for day in &plan.days {
                println!("day {}:", day.day);
                for block in &day.blocks {
                    println!(
                        "  {:02}:{:02}-{:02}:{:02}  {}",
                        block.start_minute / 60,
                        block.start_minute % 60,
                        block.end_minute / 60,
                        block.end_minute % 60,
                        block.name
                    );
                }
            }
        }
    }

    Ok(())
}
