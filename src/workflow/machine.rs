//! 阶段状态机
//!
//! 单回合内的全部推进逻辑：收集 → 检索 → 人工确认 → 起草 → 预算 → 校验。
//! 校验发现阻断性违规时走 validating → planning 回边，重规划次数封顶后带未解决
//! 发现降级完成。能力失败被吸收为 phase=failed + FailureCause，不向调用方抛错；
//! 只有协议违例以 Err 浮出，且保证不改动会话状态。

use std::future::Future;
use std::sync::Arc;

use crate::capability::{
    call_with_timeout, CapabilityFailure, DraftInput, PreferenceExtractor, ResearchQuery,
    TripDrafter,
};
use crate::core::TurnError;
use crate::critic::{self, CriticConfig};
use crate::model::{Category, NormalizedResult, ReplanAction, ViolationFinding, ViolationRecord};
use crate::research::ResearchDispatcher;
use crate::session::{FailureCause, Session};
use crate::workflow::types::{Interrupt, Phase, SelectionResponse, Turn};

/// 阶段状态机：持有注入的能力与校验参数，本身无会话状态
pub struct PhaseMachine {
    extractor: Arc<dyn PreferenceExtractor>,
    drafter: Arc<dyn TripDrafter>,
    dispatcher: ResearchDispatcher,
    critic: CriticConfig,
    max_replans: u32,
}

impl PhaseMachine {
    pub fn new(
        extractor: Arc<dyn PreferenceExtractor>,
        drafter: Arc<dyn TripDrafter>,
        dispatcher: ResearchDispatcher,
        critic: CriticConfig,
        max_replans: u32,
    ) -> Self {
        Self {
            extractor,
            drafter,
            dispatcher,
            critic,
            max_replans,
        }
    }

    /// 对会话施加一个回合，返回面向用户的应答文本。
    /// Err 分支（协议违例）保证不改动 `session`。
    pub async fn apply(&self, session: &mut Session, turn: Turn) -> Result<String, TurnError> {
        if session.phase.is_terminal() {
            return Err(TurnError::ProtocolViolation(format!(
                "session is already {}, start a new session",
                session.phase
            )));
        }

        match turn {
            Turn::Message { text } => {
                if session.pending_interrupt.is_some() {
                    return Err(TurnError::ProtocolViolation(
                        "a selection is pending, reply with a selection for it".to_string(),
                    ));
                }
                if session.phase != Phase::Collecting {
                    return Err(TurnError::ProtocolViolation(format!(
                        "free-form messages are not accepted in phase {}",
                        session.phase
                    )));
                }
                self.on_message(session, &text).await
            }
            Turn::Selection { response } => self.on_selection(session, response).await,
        }
    }

    async fn on_message(&self, session: &mut Session, text: &str) -> Result<String, TurnError> {
        let extracted = call_with_timeout(
            "preference extraction",
            self.extractor.timeout(),
            self.extractor.extract(text, &session.preferences),
        )
        .await;
        let partial = match extracted {
            Ok(p) => p,
            Err(f) => return Ok(self.fail(session, "extract", f)),
        };

        session.preferences = partial.apply_to(&session.preferences);
        if !session.preferences.is_complete() {
            let missing = session.preferences.missing_fields();
            return Ok(format!(
                "Got it. Before I can research options I still need: {}.",
                missing.join(", ")
            ));
        }
        self.enter_researching(session).await
    }

    /// 偏好集齐：fan-out 全部数据源，然后进入人工确认或直接起草
    async fn enter_researching(&self, session: &mut Session) -> Result<String, TurnError> {
        self.transition(session, Phase::Researching);
        let query = ResearchQuery {
            preferences: session.preferences.clone(),
        };
        session.research = self.dispatcher.dispatch(&query).await;
        self.raise_next_interrupt(session).await
    }

    async fn on_selection(
        &self,
        session: &mut Session,
        response: SelectionResponse,
    ) -> Result<String, TurnError> {
        let Some(interrupt) = session.pending_interrupt.as_ref() else {
            return Err(TurnError::ProtocolViolation(
                "no selection is pending".to_string(),
            ));
        };
        if response.category != interrupt.category {
            return Err(TurnError::ProtocolViolation(format!(
                "pending selection is for {}, got a {} response",
                interrupt.category, response.category
            )));
        }

        if !interrupt.allow_custom_addition && !response.custom_additions.is_empty() {
            return Err(TurnError::ProtocolViolation(format!(
                "custom additions are not allowed for this {} selection",
                interrupt.category
            )));
        }

        // 先整体校验，任何未知 id 都原样拒绝、不动状态
        let mut chosen: Vec<NormalizedResult> = Vec::with_capacity(response.chosen_ids.len());
        for id in &response.chosen_ids {
            match interrupt.candidates.iter().find(|c| &c.id == id) {
                Some(candidate) => chosen.push(candidate.clone()),
                None => {
                    return Err(TurnError::ProtocolViolation(format!(
                        "'{}' is not in the candidate set for {}",
                        id, interrupt.category
                    )))
                }
            }
        }
        for name in &response.custom_additions {
            chosen.push(NormalizedResult::user_added(name));
        }

        let category = interrupt.category;
        session.pending_interrupt = None;
        session.selections.insert(category, chosen);
        tracing::info!(
            session = %session.session_id,
            category = %category,
            count = session.selections[&category].len(),
            "selection confirmed"
        );
        self.raise_next_interrupt(session).await
    }

    /// 按固定顺序弹出下一个未确认类别的中断；全部确认后进入起草链。
    /// 候选集为空的类别记为空选择直接跳过。
    async fn raise_next_interrupt(&self, session: &mut Session) -> Result<String, TurnError> {
        for category in Category::selection_order() {
            if session.selections.contains_key(&category) {
                continue;
            }
            let candidates: Vec<NormalizedResult> = session
                .research
                .get(category.source_name())
                .filter(|r| r.is_success())
                .map(|r| r.results.clone())
                .unwrap_or_default();
            if candidates.is_empty() {
                session.selections.insert(category, Vec::new());
                continue;
            }
            let interrupt = Interrupt::select_from(category, candidates);
            let prompt = interrupt.prompt.clone();
            session.pending_interrupt = Some(interrupt);
            self.transition(session, Phase::AwaitingSelection);
            return Ok(prompt);
        }
        self.run_planning_chain(session).await
    }

    /// 起草 → 预算 → 校验，阻断性发现驱动带修正指令的重规划回边
    async fn run_planning_chain(&self, session: &mut Session) -> Result<String, TurnError> {
        let mut directive: Option<String> = None;
        loop {
            self.transition(session, Phase::Planning);
            let input = DraftInput {
                preferences: session.preferences.clone(),
                selections: session.selections.clone(),
                research: session.research.clone(),
                directive: directive.clone(),
            };
            let plan = match self
                .call_drafter("itinerary draft", || self.drafter.draft_itinerary(&input))
                .await
            {
                Ok(p) => p,
                Err(f) => return Ok(self.fail(session, "draft", f)),
            };

            self.transition(session, Phase::Budgeting);
            let budget = match self
                .call_drafter("budget estimate", || {
                    self.drafter
                        .estimate_budget(&session.preferences, &plan, &session.research)
                })
                .await
            {
                Ok(b) => b,
                Err(f) => return Ok(self.fail(session, "budget", f)),
            };

            self.transition(session, Phase::Validating);
            let findings = critic::evaluate(
                &self.critic,
                &session.preferences,
                &session.selections,
                &plan,
                &budget,
            );
            session.plan = Some(plan);
            session.budget = Some(budget);

            if !findings.iter().any(ViolationFinding::is_blocking) {
                session.violation_history.push(ViolationRecord {
                    findings: findings.clone(),
                    action: ReplanAction::Accepted,
                });
                self.transition(session, Phase::Complete);
                return Ok(self.summary_reply(session, &findings));
            }

            if session.replan_count < self.max_replans {
                session.replan_count += 1;
                directive = critic::correction_directive(&findings);
                tracing::info!(
                    session = %session.session_id,
                    attempt = session.replan_count,
                    blocking = findings.iter().filter(|f| f.is_blocking()).count(),
                    "blocking violations, replanning"
                );
                session.violation_history.push(ViolationRecord {
                    findings,
                    action: ReplanAction::Replanned {
                        attempt: session.replan_count,
                    },
                });
                continue;
            }

            // 重规划预算耗尽：带未解决发现降级完成，不标记失败
            let explanation = match self
                .call_drafter("violation explanation", || {
                    self.drafter.explain_violations(&findings)
                })
                .await
            {
                Ok(text) => text,
                Err(_) => findings
                    .iter()
                    .map(|f| f.explanation.clone())
                    .collect::<Vec<_>>()
                    .join("; "),
            };
            session.violation_history.push(ViolationRecord {
                findings,
                action: ReplanAction::AcceptedUnresolved {
                    explanation: explanation.clone(),
                },
            });
            self.transition(session, Phase::Complete);
            return Ok(format!(
                "Here is the best plan I could settle on. Some issues remain unresolved: {}",
                explanation
            ));
        }
    }

    /// 起草能力调用：声明式超时 + 瞬态失败重试一次
    async fn call_drafter<T, Fut>(
        &self,
        what: &str,
        op: impl Fn() -> Fut,
    ) -> Result<T, CapabilityFailure>
    where
        Fut: Future<Output = Result<T, CapabilityFailure>>,
    {
        let limit = self.drafter.timeout();
        match call_with_timeout(what, limit, op()).await {
            Ok(v) => Ok(v),
            Err(f) if f.retryable => {
                tracing::debug!(what, error = %f, "transient drafter failure, retrying once");
                call_with_timeout(what, limit, op()).await
            }
            Err(f) => Err(f),
        }
    }

    fn summary_reply(&self, session: &Session, findings: &[ViolationFinding]) -> String {
        let days = session.plan.as_ref().map(|p| p.days.len()).unwrap_or(0);
        let mut reply = match &session.budget {
            Some(b) => format!(
                "Your {}-day plan is ready. Estimated cost: {:.2} {} (range {:.2}-{:.2}).",
                days, b.expected, b.currency, b.low, b.high
            ),
            None => format!("Your {}-day plan is ready.", days),
        };
        let advisories: Vec<&str> = findings
            .iter()
            .filter(|f| !f.is_blocking())
            .map(|f| f.explanation.as_str())
            .collect();
        if !advisories.is_empty() {
            reply.push_str(&format!(" Heads up: {}.", advisories.join("; ")));
        }
        reply
    }

    fn transition(&self, session: &mut Session, to: Phase) {
        tracing::info!(
            session = %session.session_id,
            from = %session.phase,
            to = %to,
            "phase transition"
        );
        session.phase = to;
    }

    /// 能力失败吸收为终态 failed；返回面向用户的说明
    fn fail(&self, session: &mut Session, stage: &str, failure: CapabilityFailure) -> String {
        tracing::error!(
            session = %session.session_id,
            stage,
            error = %failure,
            "capability failure, session failed"
        );
        session.pending_interrupt = None;
        session.failure = Some(FailureCause {
            stage: stage.to_string(),
            message: failure.to_string(),
        });
        self.transition(session, Phase::Failed);
        format!(
            "Planning failed during {}: {}. Please start a new session.",
            stage, failure.message
        )
    }
}
