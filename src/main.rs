fn main() -> anyhow::Result<()> {
    orbit_viewer::run()
}
