//! 渲染器端到端测试：从磁盘上的模板文件出发，验证定位、编译缓存与执行。

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use weeb::config::Config;
use weeb::exception::Exception;
use weeb::renderer::TemplateRenderer;

fn write_template(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
}

fn renderer_for(dirs: &[&tempfile::TempDir], production: bool) -> TemplateRenderer {
    let mut config = Config::new();
    config.set_production(production);
    for dir in dirs {
        config.add_template_folder(dir.path().to_string_lossy().to_string());
    }
    TemplateRenderer::new(Arc::new(config))
}

#[tokio::test]
async fn render_simple_template_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "greeting.html", "Hello <%= name %>!");

    let renderer = renderer_for(&[&dir], false);
    let output = renderer
        .render("greeting", &json!({"name": "Joe"}))
        .await
        .unwrap();

    assert_eq!(output, "Hello Joe!");
}

#[tokio::test]
async fn missing_template_reports_logical_name() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = renderer_for(&[&dir], false);

    let result = renderer.render("ghost", &json!({})).await;
    assert_eq!(
        result.unwrap_err(),
        Exception::TemplateNotFound("ghost".to_string())
    );
}

#[tokio::test]
async fn first_template_folder_wins() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_template(dir_a.path(), "page.html", "from A");
    write_template(dir_b.path(), "page.html", "from B");

    let renderer = renderer_for(&[&dir_a, &dir_b], false);
    let output = renderer.render("page", &json!({})).await.unwrap();

    assert_eq!(output, "from A");
}

#[tokio::test]
async fn later_folder_serves_templates_missing_from_earlier_ones() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_template(dir_b.path(), "only_b.html", "b side");

    let renderer = renderer_for(&[&dir_a, &dir_b], false);
    let output = renderer.render("only_b", &json!({})).await.unwrap();

    assert_eq!(output, "b side");
}

#[tokio::test]
async fn production_mode_compiles_each_source_once() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "page.html", "Hi <%= name %>");

    let renderer = renderer_for(&[&dir], true);

    renderer.render("page", &json!({"name": "a"})).await.unwrap();
    renderer.render("page", &json!({"name": "b"})).await.unwrap();
    renderer.render("page", &json!({"name": "c"})).await.unwrap();

    assert_eq!(renderer.compile_count(), 1);
    assert_eq!(renderer.cached_templates(), 1);
}

#[tokio::test]
async fn production_cache_keys_on_content_not_name() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "first.html", "Same <%= x %>");
    write_template(dir.path(), "second.html", "Same <%= x %>");

    let renderer = renderer_for(&[&dir], true);

    renderer.render("first", &json!({"x": 1})).await.unwrap();
    renderer.render("second", &json!({"x": 2})).await.unwrap();

    // 内容相同的两个文件共享同一份编译产物
    assert_eq!(renderer.compile_count(), 1);
    assert_eq!(renderer.cached_templates(), 1);
}

#[tokio::test]
async fn development_mode_recompiles_every_render() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "page.html", "Hi <%= name %>");

    let renderer = renderer_for(&[&dir], false);

    renderer.render("page", &json!({"name": "a"})).await.unwrap();
    renderer.render("page", &json!({"name": "b"})).await.unwrap();

    assert_eq!(renderer.compile_count(), 2);
    assert_eq!(renderer.cached_templates(), 0);
}

#[tokio::test]
async fn development_mode_picks_up_edits() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "page.html", "old text");

    let renderer = renderer_for(&[&dir], false);
    assert_eq!(renderer.render("page", &json!({})).await.unwrap(), "old text");

    std::thread::sleep(std::time::Duration::from_millis(20));
    write_template(dir.path(), "page.html", "new text");

    assert_eq!(renderer.render("page", &json!({})).await.unwrap(), "new text");
}

#[tokio::test]
async fn repeated_renders_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "list.html",
        "<ul><% for item in items %><li><%= item.name %></li><% end %></ul>",
    );

    let renderer = renderer_for(&[&dir], true);
    let context = json!({"items": [{"name": "a"}, {"name": "b"}]});

    let first = renderer.render("list", &context).await.unwrap();
    let second = renderer.render("list", &context).await.unwrap();

    assert_eq!(first, "<ul><li>a</li><li>b</li></ul>");
    assert_eq!(first, second);
}

#[tokio::test]
async fn render_error_propagates_without_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "broken.html", "Hello <%= missing %>!");

    let renderer = renderer_for(&[&dir], false);
    let result = renderer.render("broken", &json!({})).await;

    assert!(matches!(result, Err(Exception::TemplateRender(_))));
}

#[tokio::test]
async fn compile_error_propagates() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "bad.html", "text <% if show %> unclosed");

    let renderer = renderer_for(&[&dir], false);
    let result = renderer.render("bad", &json!({"show": true})).await;

    assert!(matches!(result, Err(Exception::TemplateCompile(_))));
}

#[tokio::test]
async fn custom_template_extension_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "mail.tpl", "Dear <%= who %>");

    let mut config = Config::new();
    config.add_template_folder(dir.path().to_string_lossy().to_string());
    config.set_template_extension("tpl");
    let renderer = TemplateRenderer::new(Arc::new(config));

    let output = renderer.render("mail", &json!({"who": "you"})).await.unwrap();
    assert_eq!(output, "Dear you");
}
