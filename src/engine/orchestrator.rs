//! 编排器：逐轮 worker 与引擎装配
//!
//! 一个 worker 任务串行消费输入命令，依次走 路由 -> 对话流程 -> 分发，
//! 把最终回复写到输出端并通过通道回传。会话状态与忙闲信号只由这个 worker 写，
//! 监视器等旁路任务只读（watch 通道）。

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::classify::IntentClassifier;
use crate::config::AppConfig;
use crate::dialogue::{AuthorizationProbe, DialogueManager, FlowTurn, ListedItem, ListingFlow, ScheduleFlow};
use crate::dispatch::{ActionDispatcher, CapabilityRegistry};
use crate::engine::output::ResponseSink;
use crate::engine::types::{
    EngineResponse, Notification, RouteCategory, Utterance, WorkerStatus,
};
use crate::router::{ConfidenceRouter, RouterOptions, RuleTable, FLOW_CANCELLED_INTENT};

/// worker 消费的命令
#[derive(Debug)]
pub enum Command {
    /// 处理一轮用户话语
    Submit(Utterance),
    /// 外部请求取消某会话的活跃流程（如界面上的取消按钮）
    Cancel { session_id: String },
    /// 退出 worker
    Quit,
}

/// 编排引擎：路由器 + 对话管理器 + 分发器
///
/// 所有方法都要求 `&mut self`：设计上只被单个 worker 持有。
pub struct Engine {
    router: ConfidenceRouter,
    dialogue: DialogueManager,
    dispatcher: ActionDispatcher,
    language: String,
}

impl Engine {
    pub fn new(
        cfg: &AppConfig,
        classifier: Arc<dyn IntentClassifier>,
        registry: CapabilityRegistry,
        auth: Arc<dyn AuthorizationProbe>,
    ) -> Self {
        let router = ConfidenceRouter::new(
            classifier,
            RuleTable::from_config(&cfg.router.overrides),
            RouterOptions::from_config(cfg),
        );
        let mut dialogue = DialogueManager::new(cfg.dialogue.max_slot_retries);
        dialogue.register(Arc::new(ScheduleFlow::new(auth)));
        dialogue.register(Arc::new(ListingFlow::new()));

        Self {
            router,
            dialogue,
            dispatcher: ActionDispatcher::new(registry),
            language: cfg.app.language.clone(),
        }
    }

    /// 无模型环境 / 演示用的默认装配：Mock 分类器（只靠规则与关键词兜底）+ 恒通过授权
    pub fn with_mock_classifier(cfg: &AppConfig, registry: CapabilityRegistry) -> Self {
        Self::new(
            cfg,
            Arc::new(crate::classify::MockClassifier::new()),
            registry,
            Arc::new(crate::dialogue::AlwaysAuthorized),
        )
    }

    pub fn registry_mut(&mut self) -> &mut CapabilityRegistry {
        self.dispatcher.registry_mut()
    }

    /// 处理一轮话语，返回最终回复；内部任何失败都折叠成面向用户的文本
    pub async fn process(&mut self, utterance: &Utterance) -> EngineResponse {
        let session_id = utterance.session_id.as_str();
        let flow_active = self.dialogue.is_active(session_id);
        let decision = self.router.route(utterance, flow_active).await;
        tracing::info!(
            session = session_id,
            intent = %decision.intent,
            confidence = decision.confidence,
            category = ?decision.category,
            cancel = decision.cancel_flow,
            "routed"
        );

        if decision.cancel_flow {
            self.dialogue.cancel(session_id);
        }

        let text = match decision.category {
            RouteCategory::ContinueFlow => {
                let turn = self.dialogue.advance(session_id, utterance).await;
                self.flow_turn_text(session_id, turn).await
            }
            RouteCategory::LowConfidenceFallback => {
                "Sorry, I didn't catch that. Could you rephrase?".to_string()
            }
            RouteCategory::Conversational if decision.intent == FLOW_CANCELLED_INTENT => {
                "Okay, I've cancelled that.".to_string()
            }
            RouteCategory::Action | RouteCategory::Conversational => {
                match self
                    .dialogue
                    .try_start(session_id, &decision.intent, utterance)
                    .await
                {
                    Some(turn) => self.flow_turn_text(session_id, turn).await,
                    None => {
                        let payload = json!({ "text": utterance.text });
                        let result = self.dispatcher.dispatch(&decision.intent, payload).await;
                        self.absorb_listing(session_id, result.payload.as_ref());
                        result.response
                    }
                }
            }
        };

        EngineResponse {
            session_id: session_id.to_string(),
            text,
            language: self.language.clone(),
            category: decision.category,
        }
    }

    /// 外部（非话语）取消请求
    pub fn cancel_session(&mut self, session_id: &str) -> EngineResponse {
        let text = if self.dialogue.cancel(session_id) {
            "Okay, I've cancelled that.".to_string()
        } else {
            "There's nothing to cancel right now.".to_string()
        };
        EngineResponse {
            session_id: session_id.to_string(),
            text,
            language: self.language.clone(),
            category: RouteCategory::Conversational,
        }
    }

    /// 把流程单轮结果转成回复文本；Completed 在此处交给分发器
    async fn flow_turn_text(&mut self, session_id: &str, turn: FlowTurn) -> String {
        match turn {
            FlowTurn::NeedMoreInfo { prompt } => prompt,
            FlowTurn::Rejected { response }
            | FlowTurn::Cancelled { response }
            | FlowTurn::Failed { response } => response,
            FlowTurn::Completed { intent, payload } => {
                let result = self.dispatcher.dispatch(&intent, payload).await;
                self.absorb_listing(session_id, result.payload.as_ref());
                result.response
            }
        }
    }

    /// 动作结果载荷里带 items 数组时，记入该会话的最近展示列表
    fn absorb_listing(&mut self, session_id: &str, payload: Option<&Value>) {
        let Some(items) = payload
            .and_then(|p| p.get("items"))
            .and_then(Value::as_array)
        else {
            return;
        };
        let listed: Vec<ListedItem> = items
            .iter()
            .filter_map(|item| {
                let id = item.get("id")?.as_str()?;
                let title = item.get("title")?.as_str()?;
                Some(ListedItem {
                    id: id.to_string(),
                    title: title.to_string(),
                })
            })
            .collect();
        if !listed.is_empty() {
            self.dialogue.record_listing(session_id, listed);
        }
    }
}

/// 运行中引擎的句柄：命令入口、回复出口、忙闲只读信号与通知入口
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    responses: mpsc::UnboundedReceiver<EngineResponse>,
    status: watch::Receiver<WorkerStatus>,
    notifications: mpsc::UnboundedSender<Notification>,
    shutdown: CancellationToken,
}

impl EngineHandle {
    pub fn submit(&self, utterance: Utterance) -> anyhow::Result<()> {
        self.commands
            .send(Command::Submit(utterance))
            .map_err(|_| anyhow::anyhow!("engine worker stopped"))
    }

    pub fn cancel(&self, session_id: &str) -> anyhow::Result<()> {
        self.commands
            .send(Command::Cancel {
                session_id: session_id.to_string(),
            })
            .map_err(|_| anyhow::anyhow!("engine worker stopped"))
    }

    pub fn quit(&self) {
        let _ = self.commands.send(Command::Quit);
    }

    /// 下一条回复；worker 退出后返回 None
    pub async fn recv(&mut self) -> Option<EngineResponse> {
        self.responses.recv().await
    }

    pub fn status(&self) -> WorkerStatus {
        *self.status.borrow()
    }

    /// 忙闲信号的只读副本（供监视器等旁路任务使用）
    pub fn status_receiver(&self) -> watch::Receiver<WorkerStatus> {
        self.status.clone()
    }

    /// 通知入口（供监视器排入待播通知）
    pub fn notification_sender(&self) -> mpsc::UnboundedSender<Notification> {
        self.notifications.clone()
    }

    /// 与 worker 共享的关停令牌；worker 退出时也会触发它
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// 装配并启动引擎 worker
pub fn spawn_engine(
    cfg: &AppConfig,
    classifier: Arc<dyn IntentClassifier>,
    registry: CapabilityRegistry,
    auth: Arc<dyn AuthorizationProbe>,
    sink: Arc<dyn ResponseSink>,
) -> EngineHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (resp_tx, resp_rx) = mpsc::unbounded_channel::<EngineResponse>();
    let (status_tx, status_rx) = watch::channel(WorkerStatus::Idle);
    let (note_tx, mut note_rx) = mpsc::unbounded_channel::<Notification>();
    let shutdown = CancellationToken::new();

    let mut engine = Engine::new(cfg, classifier, registry, auth);
    let language = cfg.app.language.clone();
    let worker_shutdown = shutdown.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = worker_shutdown.cancelled() => break,
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    match cmd {
                        Command::Submit(utterance) => {
                            let _ = status_tx.send(WorkerStatus::Busy);
                            let response = engine.process(&utterance).await;
                            sink.deliver(&response);
                            let _ = resp_tx.send(response);
                            let _ = status_tx.send(WorkerStatus::Idle);
                        }
                        Command::Cancel { session_id } => {
                            let response = engine.cancel_session(&session_id);
                            sink.deliver(&response);
                            let _ = resp_tx.send(response);
                        }
                        Command::Quit => break,
                    }
                }
                // 监视器只在 worker 空闲时产出通知，这里直接转成回复投递
                note = note_rx.recv() => {
                    let Some(note) = note else { continue };
                    let response = EngineResponse {
                        session_id: "system".to_string(),
                        text: note.text,
                        language: language.clone(),
                        category: RouteCategory::Conversational,
                    };
                    sink.deliver(&response);
                    let _ = resp_tx.send(response);
                }
            }
        }
        worker_shutdown.cancel();
        tracing::info!("engine worker stopped");
    });

    EngineHandle {
        commands: cmd_tx,
        responses: resp_rx,
        status: status_rx,
        notifications: note_tx,
        shutdown,
    }
}
