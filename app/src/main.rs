fn main() -> anyhow::Result<()> {
    phoneprobe_app::run()
}
