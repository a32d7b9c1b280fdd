//! Browser-side bridge: the injected script and its HTML injection point.
//!
//! The bridge is generated server-side as one `<script>` block and inserted
//! into every served HTML document. It owns the whole client half of the
//! protocol: click capture, snapshot building, the event POST, and applying
//! the returned update actions. It is wrapped in an IIFE and leaks no
//! globals onto the page.

use std::sync::OnceLock;

use regex::Regex;

use crate::action::EVENT_ENDPOINT;

/// Marker comment at the top of the generated script. Injection checks for
/// it, so a document never carries the bridge twice.
pub const BRIDGE_MARKER: &str = "/* domserve bridge 1.0.0 */";

/// Placeholder in the template, replaced with [`EVENT_ENDPOINT`].
const ENDPOINT_PLACEHOLDER: &str = "__DOMSERVE_ENDPOINT__";

const BRIDGE_TEMPLATE: &str = r#"<script>
/* domserve bridge 1.0.0 */
(function () {
  'use strict';

  function observedValue(el) {
    if (typeof el.value !== 'undefined') return el.value;
    return (el.textContent || '').trim();
  }

  function buildSnapshot() {
    const snap = {};
    document.querySelectorAll('[id]').forEach(el => {
      snap['#' + el.id] = observedValue(el);
    });
    // first element per class, document order
    document.querySelectorAll('[class]').forEach(el => {
      el.classList.forEach(name => {
        const key = '.' + name;
        if (!(key in snap)) snap[key] = observedValue(el);
      });
    });
    return snap;
  }

  function applySet(selector, content) {
    document.querySelectorAll(selector).forEach(el => {
      if ('value' in el) el.value = content;
      else el.textContent = content;
    });
  }

  function applyRemove(selector) {
    document.querySelectorAll(selector).forEach(el => el.remove());
  }

  function applyOverlay(url) {
    const existing = document.getElementById('__domserve_overlay');
    if (existing) existing.remove();

    const overlay = document.createElement('div');
    overlay.id = '__domserve_overlay';
    overlay.style.cssText = 'position:fixed;top:0;left:0;width:100%;height:100%;' +
      'z-index:2147483647;background-color:#000;display:flex;align-items:center;justify-content:center;';

    const img = document.createElement('img');
    img.src = url;
    img.style.cssText = 'width:100%;height:100%;object-fit:cover;display:block;';

    overlay.addEventListener('click', () => overlay.remove());
    overlay.appendChild(img);
    document.body.appendChild(overlay);
  }

  function applyUpdate(update) {
    // untagged {selector, content} predates the action field; treat as set
    if (update && update.selector && update.content && !update.action) {
      applySet(update.selector, update.content);
      return;
    }
    switch (update.action) {
      case 'set':
        applySet(update.selector, update.content);
        break;
      case 'remove':
        applyRemove(update.selector);
        break;
      case 'console':
        console.log(update.message);
        break;
      case 'easteregg':
        applyOverlay(update.url);
        break;
      default:
        break;
    }
  }

  async function trigger(selector, type) {
    try {
      const res = await fetch('__DOMSERVE_ENDPOINT__', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ selector: selector, type: type, snapshot: buildSnapshot() })
      });
      if (!res.ok) return;
      const updates = await res.json();
      if (!Array.isArray(updates)) return;
      updates.forEach(update => {
        try {
          applyUpdate(update);
        } catch (e) {
          console.warn('domserve update failed', e);
        }
      });
    } catch (e) {
      console.warn('domserve event failed', e);
    }
  }

  document.addEventListener('click', e => {
    const el = e.target;
    if (!el) return;
    if (el.id) {
      trigger('#' + el.id, 'click');
    } else if (el.classList && el.classList.length > 0) {
      trigger('.' + el.classList[0], 'click');
    }
  });
})();
</script>"#;

/// Generate the bridge script block injected into served HTML.
pub fn bridge_script() -> String {
    BRIDGE_TEMPLATE.replace(ENDPOINT_PLACEHOLDER, EVENT_ENDPOINT)
}

fn closing_body() -> &'static Regex {
    static CLOSING_BODY: OnceLock<Regex> = OnceLock::new();
    CLOSING_BODY.get_or_init(|| Regex::new(r"(?i)</body\s*>").unwrap())
}

/// Insert the bridge immediately before the closing body tag, or append it
/// when the document has none. A document already carrying the bridge
/// marker is returned untouched.
pub fn inject_bridge(html: &str) -> String {
    if html.contains(BRIDGE_MARKER) {
        return html.to_owned();
    }

    let script = bridge_script();
    match closing_body().find(html) {
        Some(tag) => {
            let mut out = String::with_capacity(html.len() + script.len() + 1);
            out.push_str(&html[..tag.start()]);
            out.push_str(&script);
            out.push('\n');
            out.push_str(&html[tag.start()..]);
            out
        }
        None => format!("{html}\n{script}"),
    }
}
