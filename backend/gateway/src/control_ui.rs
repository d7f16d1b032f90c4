//! Minimal upload page served at `GET /ocr/`.

use axum::response::Html;

const UPLOAD_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>ocrgate</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 3rem auto; }
    label { display: block; margin: 1rem 0 .25rem; }
    pre { background: #f4f4f4; padding: 1rem; overflow-x: auto; }
  </style>
</head>
<body>
  <h1>Text recognition</h1>
  <form id="upload" action="/ocr/" method="post" enctype="multipart/form-data">
    <label for="img_file">Image (jpg, jpeg, png, tiff, bmp)</label>
    <input id="img_file" name="img_file" type="file" accept=".jpg,.jpeg,.png,.tiff,.bmp" required>
    <label for="language">Languages (comma separated)</label>
    <input id="language" name="language" type="text" placeholder="ch_sim,en">
    <p><button type="submit">Recognize</button></p>
  </form>
  <pre id="result"></pre>
  <script>
    document.getElementById("upload").addEventListener("submit", async (event) => {
      event.preventDefault();
      const out = document.getElementById("result");
      out.textContent = "Working...";
      const resp = await fetch("/ocr/", { method: "POST", body: new FormData(event.target) });
      out.textContent = JSON.stringify(await resp.json(), null, 2);
    });
  </script>
</body>
</html>
"#;

/// Handler for `GET /ocr/`.
pub async fn upload_page() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}
