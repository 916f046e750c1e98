//! Print the render context of a DBC file as JSON.
//!
//! Run with: cargo run --example render_context -- path/to/CANBus1.dbc [out.json]

use canschema::Bus;
use canschema::codegen::RenderContext;

fn main() -> canschema::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: render_context <file.dbc> [out.json]");
        std::process::exit(2);
    };

    let bus = Bus::from_file(&path)?;
    for collision in bus.offset_collisions() {
        eprintln!(
            "warning: 0x{:X} and 0x{:X} share node offsets",
            collision.lower, collision.upper
        );
    }

    let context = RenderContext::from_bus(&bus);
    match args.next() {
        Some(out) => {
            context.write_json(&out)?;
            println!("Wrote {} messages to {}", context.message_dict.len(), out);
        }
        None => println!("{}", context.to_json()?),
    }
    Ok(())
}
