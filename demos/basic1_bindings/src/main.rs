use crate::tracing_setup::tracing_init;
use futures::StreamExt;
use reactive_bridge::mock::MockObject;
use reactive_bridge::{
    bind_to, rx_action, rx_filter, rx_input, rx_map, rx_property_changes, rx_scan, ActionArgs,
    Host, HostExt, HostRef, Observable, StreamError, Subject,
};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

mod tracing_setup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init()?;

    let temperatures = Subject::<i32>::new();
    let component = MockObject::builder()
        .computed("readings", rx_input::<i32>())
        .computed("warm", rx_filter("readings", |_: &HostRef, t: &i32| *t >= 20))
        .computed(
            "label",
            rx_map("readings", |host: &HostRef, t: i32| {
                let unit = host.get_as::<String>("unit").unwrap_or_default();
                format!("{t}{unit}")
            }),
        )
        .computed(
            "peak",
            rx_scan("readings", i32::MIN, |_: &HostRef, peak: i32, t: i32| peak.max(t)),
        )
        .computed("current", bind_to::<String>("label"))
        .property("unit", "°C".to_string())
        .computed("unit_changes", rx_property_changes::<String>("unit"))
        .computed("clicks", rx_input::<ActionArgs>())
        .action("click", rx_action("clicks"))
        .build();

    info!("==========================================");
    info!("rx_input: the component receives its readings as an observable");
    component.set_to("readings", temperatures.to_observable());

    let warm = component.get_observable::<i32>("warm").ok_or("warm is not an observable")?;
    let peak = component.get_observable::<i32>("peak").ok_or("peak is not an observable")?;
    let warm_sub = warm.subscribe(|t| info!(t, "warm reading"), |err| warn!(%err, "warm failed"));
    let peak_sub = peak.subscribe(|t| info!(t, "new peak"), |err| warn!(%err, "peak failed"));

    info!("bind_to: `current` follows `label`");
    component.get("current");
    sleep(Duration::from_millis(10)).await;

    for t in [12, 21, 18, 25] {
        temperatures.next(t);
        sleep(Duration::from_millis(10)).await;
        info!(current = ?component.get_as::<String>("current"), "bound value");
    }

    info!("==========================================");
    info!("rx_property_changes: watching `unit`");
    let mut unit_changes = component
        .get_observable::<String>("unit_changes")
        .ok_or("unit_changes is not an observable")?
        .to_stream();
    component.set_to("unit", "K".to_string());
    if let Some(unit) = unit_changes.next().await {
        info!(unit = ?unit, "unit changed");
    }

    info!("==========================================");
    info!("rx_action: clicks become an observable of argument lists");
    let clicks = component
        .get_observable::<ActionArgs>("clicks")
        .ok_or("clicks is not an observable")?;
    let (sent, received) = tokio::join!(
        async {
            component.send("click", vec![json!("left"), json!(1)]).await?;
            component.send("click", Vec::new()).await
        },
        clicks.to_stream().take(2).collect::<Vec<_>>()
    );
    sent?;
    for args in received {
        info!(args = ?args, "click");
    }

    info!("==========================================");
    info!("rx_input: switching to a failing source");
    component.set_to(
        "readings",
        Observable::<i32>::throw(StreamError::error("sensor offline")),
    );
    component.get("current");
    sleep(Duration::from_millis(10)).await;
    info!(current = ?component.get_as::<String>("current"), "bound value after failure");

    component.destroy();
    warm_sub.dispose();
    peak_sub.dispose();
    info!("destroyed: {}", component.is_destroyed());

    Ok(())
}
