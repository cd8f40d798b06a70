use std::sync::Arc;
use std::time::Duration;

use action_flow::RunState;
use formfill_cli::mapping::read_rows;
use formfill_cli::{Config, FillEngine, Mapping};
use formfill_core_types::{FillStep, RowData, SelectorEntry, StepStatus};
use page_port::{ClickEffect, ElementRef, MemoryNode, MemoryPage};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

const FORM_URL: &str = "https://example.test/cadastro";

const SIGNUP: &str = r##"
name: cadastro
targetUrl: https://example.test/cadastro
steps:
  - id: nome
    action: fill
    primary: { kind: css, value: "#nome" }
    sourceFieldKey: nome
    stepOrder: 10
  - id: apelido
    action: fill
    primary: { kind: css, value: "#apelido" }
    sourceFieldKey: apelido
    stepOrder: 20
    optional: true
  - id: aceite
    action: fill
    primary: { kind: css, value: "#termos" }
    fallbacks:
      - { kind: xpath, value: "//input[@name='aceite']" }
    sourceFieldKey: aceite
    stepOrder: 30
  - id: uf
    action: fill
    primary: { kind: css, value: "select[name=uf]" }
    sourceFieldKey: uf
    stepOrder: 40
  - id: enviar
    action: click
    primary: { kind: css, value: "#enviar" }
    stepOrder: 50
success:
  trigger: url_change
  pattern: obrigado
  timeoutMs: 5000
"##;

struct Form {
    page: Arc<MemoryPage>,
    nome: ElementRef,
    aceite: ElementRef,
    uf: ElementRef,
}

fn signup_form(submit: ClickEffect) -> Form {
    let page = Arc::new(MemoryPage::new(FORM_URL));
    let nome = page.append(MemoryNode::input("nome"));
    let aceite = page.append(
        MemoryNode::new("input")
            .input_type("checkbox")
            .attr("name", "aceite"),
    );
    let uf = page.append(
        MemoryNode::new("select")
            .attr("name", "uf")
            .option("", "Selecione")
            .option("RJ", "Rio de Janeiro")
            .option("SP", "São Paulo"),
    );
    page.append(
        MemoryNode::new("button")
            .attr("id", "enviar")
            .text("Enviar")
            .on_click(submit),
    );
    Form {
        page,
        nome,
        aceite,
        uf,
    }
}

fn first_row(csv: &str) -> RowData {
    read_rows(csv.as_bytes()).unwrap().remove(0)
}

#[tokio::test(start_paused = true)]
async fn mapping_row_fills_form_and_confirms_navigation() {
    let form = signup_form(ClickEffect::Navigate(format!("{FORM_URL}/obrigado")));
    let engine = FillEngine::new(form.page.clone(), &Config::default());
    let mapping = Mapping::parse(SIGNUP).unwrap();
    mapping.validate().unwrap();
    let row = first_row("nome,apelido,aceite,uf\nAna Souza,,sim,Rio de Janeiro\n");

    let (_, outcome) = engine
        .watch_success(mapping.success.clone().unwrap())
        .await;
    let result = engine.run_fill(&mapping.steps, &row).await;

    assert!(result.success);
    let statuses: Vec<_> = result
        .results
        .iter()
        .map(|r| (r.step_id.as_str(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("nome", StepStatus::Success),
            ("apelido", StepStatus::Failed),
            ("aceite", StepStatus::Success),
            ("uf", StepStatus::Success),
            ("enviar", StepStatus::Success),
        ]
    );
    assert_eq!(form.page.value_of(&form.nome).as_deref(), Some("Ana Souza"));
    assert_eq!(form.page.observed_value(&form.nome).as_deref(), Some("Ana Souza"));
    assert_eq!(form.page.is_checked(&form.aceite), Some(true));
    assert_eq!(form.page.value_of(&form.uf).as_deref(), Some("RJ"));

    let outcome = outcome.await.unwrap();
    assert!(outcome.succeeded, "{}", outcome.reason);
    assert!(outcome.reason.contains("obrigado"));
}

#[tokio::test(start_paused = true)]
async fn required_miss_stops_before_submit() {
    let form = signup_form(ClickEffect::Navigate(format!("{FORM_URL}/obrigado")));
    form.page.remove(&form.nome);
    let engine = FillEngine::new(form.page.clone(), &Config::default());
    let mapping = Mapping::parse(SIGNUP).unwrap();

    let result = engine
        .run_fill(&mapping.steps, &RowData::new().with("nome", "Ana"))
        .await;
    assert!(!result.success);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].reason.as_deref(), Some("element not found"));
    assert!(form.page.value_of(&form.uf).unwrap_or_default().is_empty());
}

#[tokio::test(start_paused = true)]
async fn text_signal_follows_submit_click() {
    let form = signup_form(ClickEffect::AppendText("Cadastro concluído".into()));
    let engine = FillEngine::new(form.page.clone(), &Config::default());
    let mut mapping = Mapping::parse(SIGNUP).unwrap();
    let success = mapping.success.as_mut().unwrap();
    success.trigger = formfill_core_types::SuccessTrigger::TextAppears;
    success.pattern = Some("concluído".into());
    let row = first_row("nome,aceite,uf\nBruno,nao,SP\n");

    let (_, outcome) = engine.watch_success(success.clone()).await;
    let result = engine.run_fill(&mapping.steps, &row).await;
    assert!(result.success);
    assert_eq!(form.page.is_checked(&form.aceite), Some(false));

    let outcome = outcome.await.unwrap();
    assert!(outcome.succeeded);
    assert_eq!(outcome.reason, "text 'concluído' appeared");
}

#[tokio::test(start_paused = true)]
async fn disappearing_button_confirms_submission() {
    let form = signup_form(ClickEffect::RemoveSelf);
    let engine = FillEngine::new(form.page.clone(), &Config::default());
    let mut mapping = Mapping::parse(SIGNUP).unwrap();
    let success = mapping.success.as_mut().unwrap();
    success.trigger = formfill_core_types::SuccessTrigger::ElementDisappears;
    success.selector = Some("#enviar".into());
    success.pattern = None;

    let (_, outcome) = engine.watch_success(success.clone()).await;
    let row = RowData::new().with("nome", "Carla").with("aceite", true);
    assert!(engine.run_fill(&mapping.steps, &row).await.success);
    assert!(outcome.await.unwrap().succeeded);
}

#[tokio::test(start_paused = true)]
async fn cancellation_skips_remaining_steps() {
    let page = Arc::new(MemoryPage::new(FORM_URL));
    let first = page.append(MemoryNode::input("a"));
    let last = page.append(MemoryNode::input("b"));
    let engine = FillEngine::new(page.clone(), &Config::default());
    let steps = vec![
        FillStep::fill("a", 1, SelectorEntry::css("#a")).with_fixed("1"),
        FillStep::wait("pause", 2, Some(2_000)),
        FillStep::fill("b", 3, SelectorEntry::css("#b")).with_fixed("2"),
    ];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let report = engine
        .run_fill_with_cancel(&steps, &RowData::new(), &cancel)
        .await;
    assert!(start.elapsed() < Duration::from_millis(2_000));
    assert_eq!(report.state, RunState::Cancelled);
    assert!(!report.result.success);
    assert_eq!(report.result.results.len(), 3);
    assert_eq!(report.result.results[0].status, StepStatus::Success);
    for skipped in &report.result.results[1..] {
        assert_eq!(skipped.status, StepStatus::Skipped);
        assert_eq!(skipped.reason.as_deref(), Some("run cancelled"));
    }
    assert_eq!(page.value_of(&first).as_deref(), Some("1"));
    assert_eq!(page.value_of(&last).as_deref(), Some(""));
}
