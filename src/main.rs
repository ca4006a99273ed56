//! agentic-rag 命令行入口
//!
//! 初始化日志与配置、构建 Agent；`--query` 单次问答，否则进入交互循环。
//! 运行中按 Ctrl+C 取消当前查询（不会写入检查点）。

use std::path::PathBuf;

use agentic_rag::{
    agent::create_agent, config::load_config, observability, QueryRequest, QueryResponse,
    RagAgent, RagError,
};
use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Agentic RAG 问答：单次查询或交互式会话
#[derive(Parser, Debug)]
#[command(name = "agentic-rag", version, about, long_about = None)]
struct CliArgs {
    /// 单次查询；省略时进入交互循环
    #[arg(short, long)]
    query: Option<String>,

    /// 续接的线程 ID
    #[arg(short = 't', long = "thread")]
    thread_id: Option<String>,

    /// 用户 ID（无线程 ID 时使用 user_<id>_session）
    #[arg(short = 'u', long = "user")]
    user_id: Option<String>,

    /// 额外的配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// 跑一次查询；Ctrl+C 时取消令牌并等待引擎返回部分状态
async fn run_query(agent: &RagAgent, req: QueryRequest) -> Result<QueryResponse, RagError> {
    let cancel = CancellationToken::new();
    let fut = agent.query(req, cancel.clone());
    tokio::pin!(fut);
    tokio::select! {
        r = &mut fut => r,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            fut.await
        }
    }
}

fn print_response(resp: &QueryResponse) {
    println!("\n{}\n", resp.answer);
    let source = resp
        .selected_source
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!(
        "[thread {} | rewritten: {} | source: {} | relevant: {} | iterations: {} | messages: {}]",
        resp.thread_id,
        resp.rewritten_query,
        source,
        resp.answer_is_relevant,
        resp.iteration,
        resp.message_count
    );
    if let Some(err) = &resp.error {
        println!("[error: {}]", err);
    }
}

async fn interactive(agent: &RagAgent, args: CliArgs) -> anyhow::Result<()> {
    let mut thread_id = args
        .thread_id
        .unwrap_or_else(|| agent.sessions().create(args.user_id.as_deref()));
    println!("thread: {}  (commands: new, history, sessions, quit)", thread_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "new" => {
                thread_id = agent.sessions().create(args.user_id.as_deref());
                println!("thread: {}", thread_id);
            }
            "history" => {
                for m in agent.sessions().conversation(&thread_id, 50).await? {
                    println!("{:>9}: {}", m.role.as_str(), m.content);
                }
            }
            "sessions" => {
                for s in agent.sessions().list(100).await? {
                    println!(
                        "{}  messages={}  user={}  created={}",
                        s.thread_id,
                        s.message_count,
                        s.user_id.as_deref().unwrap_or("-"),
                        s.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            query => {
                let mut req = QueryRequest::new(query).thread(thread_id.clone());
                req.user_id = args.user_id.clone();
                match run_query(agent, req).await {
                    Ok(resp) => print_response(&resp),
                    Err(e) => eprintln!("{}", e),
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args = CliArgs::parse();
    let cfg = load_config(args.config.clone()).context("Failed to load config")?;
    let agent = create_agent(&cfg).await.context("Failed to create agent")?;

    match args.query.clone() {
        Some(query) => {
            let req = QueryRequest {
                query,
                thread_id: args.thread_id.clone(),
                user_id: args.user_id.clone(),
            };
            let resp = run_query(&agent, req).await?;
            print_response(&resp);
        }
        None => interactive(&agent, args).await?,
    }
    Ok(())
}
