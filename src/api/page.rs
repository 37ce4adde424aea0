use axum::response::Html;

pub(crate) async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>StyleFinder</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
  fieldset { border: 1px solid #ccc; padding: 1rem; }
  label { display: block; margin: .5rem 0 .25rem; }
  input[type=url] { width: 100%; }
  #preview { max-width: 100%; max-height: 20rem; margin-top: 1rem; }
  #match { margin-top: 1rem; }
  #description { white-space: pre-wrap; background: #f6f6f6; padding: 1rem; }
  .error { color: #a00; }
</style>
</head>
<body>
<h1>StyleFinder</h1>
<form id="form">
  <fieldset>
    <label for="image">Upload a fashion photo</label>
    <input id="image" name="image" type="file" accept="image/*">
    <label for="image_url">or paste an image URL</label>
    <input id="image_url" name="image_url" type="url" placeholder="https://...">
    <p><button type="submit">Find my style</button></p>
  </fieldset>
</form>
<img id="preview" hidden alt="">
<div id="match"></div>
<div id="description"></div>
<script>
const form = document.getElementById("form");
const match = document.getElementById("match");
const description = document.getElementById("description");
const preview = document.getElementById("preview");

document.getElementById("image").addEventListener("change", (ev) => {
  const file = ev.target.files[0];
  if (file) { preview.src = URL.createObjectURL(file); preview.hidden = false; }
});

form.addEventListener("submit", async (ev) => {
  ev.preventDefault();
  match.textContent = "Analyzing...";
  description.textContent = "";
  try {
    const res = await fetch("/api/analyze", { method: "POST", body: new FormData(form) });
    const body = await res.json();
    if (!res.ok || !body.success) {
      match.innerHTML = "";
      const p = document.createElement("p");
      p.className = "error";
      p.textContent = body.message || body.error || ("Request failed: " + res.status);
      match.appendChild(p);
      return;
    }
    const r = body.data;
    const m = r.matched;
    match.innerHTML = "";
    const h = document.createElement("h2");
    h.textContent = (r.confidence === "strong" ? "Match: " : "Closest available: ") + m.name;
    const p = document.createElement("p");
    p.textContent = "$" + m.price.toFixed(2) + " · similarity " + m.similarity.toFixed(3) + " ";
    const a = document.createElement("a");
    a.href = m.link; a.textContent = "Buy"; a.target = "_blank"; a.rel = "noopener";
    p.appendChild(a);
    match.append(h, p);
    description.textContent = r.description;
  } catch (err) {
    match.textContent = "Request failed: " + err;
  }
});
</script>
</body>
</html>
"#;
